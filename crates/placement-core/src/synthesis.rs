//! Submission synthesis
//!
//! Turns the parsed outputs of a task's dependencies into one [`Submission`]
//! per recipient. Pure: the engine loads and parses the current artifacts,
//! this module only groups and assembles.
//!
//! Blocks are matched across dependencies by normalized recipient name. The
//! primary dependency supplies subject and body; matching blocks from the
//! other dependencies become attachments.

use crate::config::SynthesisConfig;
use crate::error::EngineError;
use crate::submission::{Attachment, Submission, SubmissionId, SubmissionStatus};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use placement_artifact::{first_heading, ParsedBlock};
use placement_graph::{Task, TaskId};
use regex::Regex;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}")
        .expect("email pattern is valid")
});

/// A parsed block and the artifact it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBlock {
    /// Name of the containing artifact
    pub artifact_name: String,
    /// The block
    pub block: ParsedBlock,
}

/// Parsed current output of one dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyOutput {
    /// Producing task
    pub task_id: TaskId,
    /// Blocks of all current parts, in part order
    pub blocks: Vec<SourceBlock>,
}

/// Result of synthesizing one task
#[derive(Debug)]
pub struct SynthesisReport {
    /// Consuming task
    pub task_id: TaskId,
    /// Derived submissions, primary recipients first
    pub submissions: Vec<Submission>,
    /// Non-fatal problems
    pub warnings: Vec<EngineError>,
}

/// Recipient name of a block: `id`, then `title`, then the first Markdown
/// heading of the body, then the artifact name.
///
/// Unlabelled parts of one output that share an artifact name and have no
/// heading resolve to the same recipient, so only the last part survives and
/// [`EngineError::AmbiguousRecipientMatch`] is reported.
#[must_use]
pub fn recipient_name(source: &SourceBlock) -> Option<String> {
    let block = &source.block;
    block
        .label()
        .map(str::to_string)
        .or_else(|| first_heading(&block.body))
        .or_else(|| Some(source.artifact_name.trim().to_string()))
        .filter(|name| !name.trim().is_empty())
}

/// Matching key for recipient names: lowercased, whitespace collapsed
#[must_use]
pub fn normalize_recipient(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

struct Candidate<'a> {
    display: String,
    block: &'a ParsedBlock,
}

struct Group<'a> {
    display: String,
    primary: Option<&'a ParsedBlock>,
    attachments: Vec<Candidate<'a>>,
}

/// Synthesize the submissions of `task` from its dependencies' outputs.
///
/// Outputs may arrive in any order; the task's dependency list decides which
/// one is primary and how the others are ordered.
#[must_use]
pub fn synthesize(
    task: &Task,
    outputs: &[DependencyOutput],
    config: &SynthesisConfig,
) -> SynthesisReport {
    let mut warnings = Vec::new();
    let mut groups: IndexMap<String, Group<'_>> = IndexMap::new();

    let ordered = task.primary().into_iter().chain(
        task.unique_dependencies()
            .into_iter()
            .filter(|dep| Some(*dep) != task.primary()),
    );

    for dep in ordered {
        let Some(output) = outputs.iter().find(|o| &o.task_id == dep) else {
            continue;
        };
        let is_primary = Some(dep) == task.primary();

        for (key, candidate) in recipients_of(output, &mut warnings) {
            let group = groups.entry(key).or_insert_with(|| Group {
                display: candidate.display.clone(),
                primary: None,
                attachments: Vec::new(),
            });
            if is_primary {
                group.display = candidate.display;
                group.primary = Some(candidate.block);
            } else {
                group.attachments.push(candidate);
            }
        }
    }

    let submissions = groups
        .into_iter()
        .map(|(key, group)| assemble(task, &key, group, config))
        .collect();

    SynthesisReport {
        task_id: task.id.clone(),
        submissions,
        warnings,
    }
}

fn recipients_of<'a>(
    output: &'a DependencyOutput,
    warnings: &mut Vec<EngineError>,
) -> IndexMap<String, Candidate<'a>> {
    let mut recipients: IndexMap<String, Candidate<'a>> = IndexMap::new();
    for source in &output.blocks {
        let Some(display) = recipient_name(source) else {
            warnings.push(EngineError::MalformedArtifact {
                task: output.task_id.clone(),
                artifact: None,
                reason: "block has no derivable recipient".into(),
            });
            continue;
        };
        let key = normalize_recipient(&display);
        if recipients.contains_key(&key) {
            warnings.push(EngineError::AmbiguousRecipientMatch {
                dependency: output.task_id.clone(),
                recipient: key.clone(),
            });
        }
        // Last block wins; the recipient keeps its first-seen position.
        recipients.insert(
            key,
            Candidate {
                display: display.trim().to_string(),
                block: &source.block,
            },
        );
    }
    recipients
}

fn assemble(task: &Task, key: &str, group: Group<'_>, config: &SynthesisConfig) -> Submission {
    let (headers, body) = group
        .primary
        .map(|block| split_headers(&block.body))
        .unwrap_or_default();

    // A title already used as the recipient name is not a subject.
    let titled = group
        .primary
        .filter(|block| block.id.is_some())
        .and_then(|block| block.title.clone());
    let subject = headers
        .subject
        .or(titled)
        .unwrap_or_else(|| config.render_subject(&group.display, &task.name));

    // Attachment bodies name third parties; only their attributes count.
    let recipient_address = group.primary.and_then(address_of).or_else(|| {
        group
            .attachments
            .iter()
            .find_map(|c| attribute_address(c.block))
    });

    let attachments = group
        .attachments
        .iter()
        .map(|c| Attachment {
            name: c.display.clone(),
            content: c.block.body.clone(),
        })
        .collect();

    Submission {
        id: SubmissionId::derive(&task.id, key),
        company_id: task.company_id.clone(),
        task_id: task.id.clone(),
        recipient_name: group.display,
        recipient_address,
        subject,
        body,
        attachments,
        status: SubmissionStatus::Draft,
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Headers {
    subject: Option<String>,
    to: Option<String>,
}

/// Split leading `Subject:` / `To:` lines off a body
fn split_headers(body: &str) -> (Headers, String) {
    let mut headers = Headers::default();
    let mut rest = body;
    loop {
        let trimmed = rest.trim_start();
        let (line, tail) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
        let line = line.trim();
        if let Some(value) = header_value(line, "subject:") {
            headers.subject = headers.subject.or(value);
        } else if let Some(value) = header_value(line, "to:") {
            headers.to = headers.to.or(value);
        } else {
            break;
        }
        rest = tail;
    }
    (headers, rest.trim().to_string())
}

/// `Some(value)` if `line` is the header `name`; the value is `None` when blank
fn header_value(line: &str, name: &str) -> Option<Option<String>> {
    let head = line.get(..name.len())?;
    if !head.eq_ignore_ascii_case(name) {
        return None;
    }
    let value = line[name.len()..].trim();
    Some((!value.is_empty()).then(|| value.to_string()))
}

fn attribute_address(block: &ParsedBlock) -> Option<String> {
    block
        .attribute("email")
        .or_else(|| block.attribute("address"))
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
}

fn address_of(block: &ParsedBlock) -> Option<String> {
    if let Some(address) = attribute_address(block) {
        return Some(address);
    }
    let (headers, _) = split_headers(&block.body);
    if let Some(to) = headers.to {
        return Some(EMAIL.find(&to).map_or(to.clone(), |m| m.as_str().to_string()));
    }
    EMAIL.find(&block.body).map(|m| m.as_str().to_string())
}
