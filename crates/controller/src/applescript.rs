use std::path::PathBuf;

use async_trait::async_trait;
use shared::domain::{CueNode, CueSample, Workspace};
use tracing::{debug, trace};

use crate::{ChannelError, NativeChannel, NativeCommand, NativeReply, TransportAction, WorkspaceScope};

pub const DEFAULT_BUNDLE_ID: &str = "com.figure53.QLab.4";

// Replies are flattened into text with ASCII unit/record separators so that
// names containing commas or quotes survive the trip through osascript.
const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';
const US: &str = "(character id 31)";
const RS: &str = "(character id 30)";
const ERROR_PREFIX: &str = "Error:";

/// Drives the controller through `osascript`.
#[derive(Debug, Clone)]
pub struct AppleScriptChannel {
    bundle_id: String,
    osascript: PathBuf,
}

impl AppleScriptChannel {
    pub fn new(bundle_id: impl Into<String>) -> Self {
        Self {
            bundle_id: bundle_id.into(),
            osascript: PathBuf::from("osascript"),
        }
    }

    pub fn with_osascript(mut self, path: impl Into<PathBuf>) -> Self {
        self.osascript = path.into();
        self
    }

    pub fn render(&self, command: &NativeCommand) -> String {
        let app = applescript_escape(&self.bundle_id);
        match command {
            NativeCommand::IsRunning => format!("return application id \"{app}\" is running"),
            NativeCommand::ListWorkspaces => self.guarded(&format!(
                "set out to \"\"\n\
                 repeat with w in workspaces\n\
                 set out to out & (name of w) & {US} & (id of w) & {RS}\n\
                 end repeat\n\
                 return out"
            )),
            NativeCommand::FrontWorkspace => self.guarded(&format!(
                "if (count of workspaces) is 0 then return \"\"\n\
                 set ws to front workspace\n\
                 return (name of ws) & {US} & (id of ws)"
            )),
            NativeCommand::SelectedCue { scope } => self.guarded(&format!(
                "set ws to {}\n\
                 set sel to selected of ws\n\
                 if (count of sel) is 0 then return \"\"\n\
                 set c to last item of sel\n\
                 return {}",
                workspace_ref(scope),
                cue_fields("c"),
            )),
            NativeCommand::ActiveCue { scope } => self.guarded(&format!(
                "set ws to {}\n\
                 set playing to active cues of ws\n\
                 if (count of playing) is 0 then return \"\"\n\
                 set c to first item of playing\n\
                 return {}",
                workspace_ref(scope),
                cue_fields("c"),
            )),
            NativeCommand::CueTree { scope } => {
                let handler = format!(
                    "on emitCues(theCues, depth)\n\
                     set out to \"\"\n\
                     repeat with c in theCues\n\
                     tell application id \"{app}\"\n\
                     set out to out & depth & {US} & {} & {RS}\n\
                     if q type of c is \"Group\" then set out to out & my emitCues(cues of c, depth + 1)\n\
                     end tell\n\
                     end repeat\n\
                     return out\n\
                     end emitCues\n",
                    cue_fields("c"),
                );
                let body = format!(
                    "set mainList to first cue list of {}\n\
                     return my emitCues(cues of mainList, 0)",
                    workspace_ref(scope),
                );
                format!("{handler}{}", self.guarded(&body))
            }
            NativeCommand::Transport { scope, action } => self.guarded(&format!(
                "set ws to {}\n{} ws\nreturn \"ok\"",
                workspace_ref(scope),
                transport_verb(*action),
            )),
            NativeCommand::SelectCue { scope, cue_id } => self.guarded(&format!(
                "set ws to {}\n\
                 set foundCue to first cue of ws whose uniqueID is \"{}\"\n\
                 set selected of ws to {{foundCue}}\n\
                 return \"ok\"",
                workspace_ref(scope),
                applescript_escape(cue_id),
            )),
        }
    }

    fn guarded(&self, body: &str) -> String {
        format!(
            "tell application id \"{}\"\n\
             try\n\
             {body}\n\
             on error errMsg\n\
             return \"{ERROR_PREFIX} \" & errMsg\n\
             end try\n\
             end tell",
            applescript_escape(&self.bundle_id),
        )
    }

    async fn run_script(&self, script: &str) -> Result<String, ChannelError> {
        let output = tokio::process::Command::new(&self.osascript)
            .arg("-e")
            .arg(script)
            .output()
            .await
            .map_err(|error| ChannelError::Transport(format!("failed to execute osascript: {error}")))?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout)
                .trim_end_matches(['\n', '\r'])
                .to_string())
        } else {
            Err(ChannelError::Script(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }
}

#[async_trait]
impl NativeChannel for AppleScriptChannel {
    fn name(&self) -> &'static str {
        "applescript"
    }

    async fn execute(&self, command: &NativeCommand) -> Result<NativeReply, ChannelError> {
        let script = self.render(command);
        trace!(command = command.kind(), %script, "running applescript");
        let raw = self.run_script(&script).await?;
        let reply = parse_reply(command, &raw);
        if let Err(error) = &reply {
            debug!(command = command.kind(), %error, "applescript reply rejected");
        }
        reply
    }
}

pub fn applescript_escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

fn workspace_ref(scope: &WorkspaceScope) -> String {
    match scope {
        WorkspaceScope::Front => "front workspace".to_string(),
        WorkspaceScope::Id(id) => {
            format!("(first workspace whose id is \"{}\")", applescript_escape(id))
        }
    }
}

fn cue_fields(var: &str) -> String {
    format!(
        "(uniqueID of {var}) & {US} & (q number of {var}) & {US} & (q display name of {var}) & {US} & (q type of {var})"
    )
}

fn transport_verb(action: TransportAction) -> &'static str {
    match action {
        TransportAction::Go => "go",
        TransportAction::Stop => "stop",
        TransportAction::Panic => "panic",
        TransportAction::Reset => "reset",
        TransportAction::MovePlayheadDown => "movePlayheadDown",
        TransportAction::MovePlayheadUp => "movePlayheadUp",
    }
}

pub(crate) fn parse_reply(command: &NativeCommand, raw: &str) -> Result<NativeReply, ChannelError> {
    if let Some(message) = raw.strip_prefix(ERROR_PREFIX) {
        return Err(ChannelError::Script(message.trim().to_string()));
    }

    match command {
        NativeCommand::IsRunning => match raw.trim() {
            "true" => Ok(NativeReply::Flag(true)),
            "false" => Ok(NativeReply::Flag(false)),
            other => Err(ChannelError::Protocol(format!("expected boolean, got {other:?}"))),
        },
        NativeCommand::ListWorkspaces => records(raw)
            .map(|fields| match fields.as_slice() {
                [name, id] => Ok(Workspace {
                    id: id.to_string(),
                    name: name.to_string(),
                }),
                _ => Err(field_count_error("workspace", 2, fields.len())),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(NativeReply::Workspaces),
        NativeCommand::FrontWorkspace => {
            if raw.is_empty() {
                return Ok(NativeReply::Workspace(None));
            }
            match split_fields(raw).as_slice() {
                [name, id] => Ok(NativeReply::Workspace(Some(Workspace {
                    id: id.to_string(),
                    name: name.to_string(),
                }))),
                fields => Err(field_count_error("workspace", 2, fields.len())),
            }
        }
        NativeCommand::SelectedCue { .. } | NativeCommand::ActiveCue { .. } => {
            if raw.is_empty() {
                return Ok(NativeReply::Cue(None));
            }
            parse_sample(&split_fields(raw)).map(|sample| NativeReply::Cue(Some(sample)))
        }
        NativeCommand::CueTree { .. } => {
            let flat = records(raw)
                .map(|fields| parse_tree_record(&fields))
                .collect::<Result<Vec<_>, _>>()?;
            build_tree(flat).map(NativeReply::Tree)
        }
        NativeCommand::Transport { .. } | NativeCommand::SelectCue { .. } => Ok(NativeReply::Done),
    }
}

fn split_fields(record: &str) -> Vec<&str> {
    record.split(FIELD_SEP).collect()
}

fn records(raw: &str) -> impl Iterator<Item = Vec<&str>> {
    raw.split(RECORD_SEP)
        .filter(|record| !record.trim().is_empty())
        .map(split_fields)
}

fn field_count_error(what: &str, expected: usize, got: usize) -> ChannelError {
    ChannelError::Protocol(format!("{what} record has {got} fields, expected {expected}"))
}

fn parse_sample(fields: &[&str]) -> Result<CueSample, ChannelError> {
    match fields {
        [id, number, name, cue_type] => Ok(CueSample {
            id: Some(id.trim())
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            number: number.to_string(),
            name: name.to_string(),
            cue_type: cue_type.to_string(),
        }),
        _ => Err(field_count_error("cue", 4, fields.len())),
    }
}

fn parse_tree_record(fields: &[&str]) -> Result<(usize, CueNode), ChannelError> {
    let [depth, rest @ ..] = fields else {
        return Err(field_count_error("cue tree", 5, 0));
    };
    let depth = depth
        .trim()
        .parse::<usize>()
        .map_err(|_| ChannelError::Protocol(format!("invalid cue depth {depth:?}")))?;
    let sample = parse_sample(rest).map_err(|_| field_count_error("cue tree", 5, fields.len()))?;
    Ok((
        depth,
        CueNode {
            id: sample.id.unwrap_or_default(),
            number: sample.number,
            name: sample.name,
            cue_type: sample.cue_type,
            children: Vec::new(),
        },
    ))
}

/// Rebuilds the nested structure from pre-order records annotated with depth.
pub(crate) fn build_tree(records: Vec<(usize, CueNode)>) -> Result<Vec<CueNode>, ChannelError> {
    fn close(roots: &mut Vec<CueNode>, open: &mut Vec<CueNode>) {
        if let Some(node) = open.pop() {
            match open.last_mut() {
                Some(parent) => parent.children.push(node),
                None => roots.push(node),
            }
        }
    }

    let mut roots = Vec::new();
    let mut open: Vec<CueNode> = Vec::new();
    for (depth, node) in records {
        if depth > open.len() {
            return Err(ChannelError::Protocol(format!(
                "cue {} at depth {depth} has no parent",
                node.id
            )));
        }
        while open.len() > depth {
            close(&mut roots, &mut open);
        }
        open.push(node);
    }
    while !open.is_empty() {
        close(&mut roots, &mut open);
    }
    Ok(roots)
}

#[cfg(test)]
#[path = "tests/applescript_tests.rs"]
mod tests;
