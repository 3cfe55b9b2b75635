use std::future::Future;

use async_trait::async_trait;
use courier_core::Update;

use super::{Action, DEFAULT_GROUP, Handler, action, incoming_message};
use crate::context::Context;
use crate::error::{HandlerError, HandlerResult};

/// A parsed `/command@mention arg1 arg2` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInput {
    /// Command name without the leading `/`.
    pub name: String,
    /// Bot username after `@`, if present.
    pub mention: Option<String>,
    /// Whitespace-split remainder.
    pub args: Vec<String>,
}

/// Splits a command line into name, mention and arguments.
///
/// Returns `None` when the text does not start with `/` or the name is empty.
pub fn parse_command(text: &str) -> Option<CommandInput> {
    let body = text.strip_prefix('/')?;
    let (head, rest) = match body.find(char::is_whitespace) {
        Some(i) => body.split_at(i),
        None => (body, ""),
    };
    let (name, mention) = match head.split_once('@') {
        Some((name, mention)) => (name, Some(mention.to_string())),
        None => (head, None),
    };
    if name.is_empty() {
        return None;
    }
    Some(CommandInput {
        name: name.to_string(),
        mention,
        args: rest.split_whitespace().map(str::to_string).collect(),
    })
}

/// Handles `/command` messages.
///
/// Command names are compared exactly, including case.
pub struct CommandHandler {
    commands: Vec<String>,
    bot_username: Option<String>,
    allow_edited: bool,
    group: String,
    action: Action<CommandInput>,
}

impl CommandHandler {
    /// Creates a handler for any of `commands` (names without `/`).
    pub fn new<I, S, F, Fut>(commands: I, f: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Context, CommandInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
            bot_username: None,
            allow_edited: false,
            group: DEFAULT_GROUP.to_string(),
            action: action(f),
        }
    }

    /// Ignores commands addressed to a different bot via `@mention`.
    pub fn bot_username(mut self, username: impl Into<String>) -> Self {
        self.bot_username = Some(username.into().trim_start_matches('@').to_string());
        self
    }

    /// Also reacts to edited messages.
    pub fn allow_edited(mut self, allow: bool) -> Self {
        self.allow_edited = allow;
        self
    }

    fn parse(&self, update: &Update) -> Option<CommandInput> {
        let text = incoming_message(update, self.allow_edited)?.text.as_deref()?;
        let input = parse_command(text)?;
        if !self.commands.iter().any(|c| *c == input.name) {
            return None;
        }
        match (&self.bot_username, &input.mention) {
            (Some(ours), Some(theirs)) if !ours.eq_ignore_ascii_case(theirs) => None,
            _ => Some(input),
        }
    }
}

group_builder!(CommandHandler);

#[async_trait]
impl Handler for CommandHandler {
    fn name(&self) -> &str {
        self.commands.first().map_or("command", String::as_str)
    }

    fn group(&self) -> &str {
        &self.group
    }

    fn matches(&self, update: &Update) -> bool {
        self.parse(update).is_some()
    }

    async fn handle(&self, ctx: Context) -> HandlerResult {
        let input = self
            .parse(ctx.update())
            .ok_or(HandlerError::MissingPayload("command"))?;
        (self.action)(ctx, input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBot, callback_update, text_update};
    use courier_core::UpdateKind;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recording(seen: &Arc<Mutex<Vec<CommandInput>>>) -> CommandHandler {
        let seen = Arc::clone(seen);
        CommandHandler::new(["start"], move |_ctx, input| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().push(input);
                Ok(())
            }
        })
    }

    #[test]
    fn test_parse_command() {
        let input = parse_command("/start@mybot extra  args").unwrap();
        assert_eq!(input.name, "start");
        assert_eq!(input.mention.as_deref(), Some("mybot"));
        assert_eq!(input.args, vec!["extra", "args"]);

        assert_eq!(parse_command("/help").unwrap().args, Vec::<String>::new());
        assert!(parse_command("start").is_none());
        assert!(parse_command("/ start").is_none());
        assert!(parse_command("/@bot").is_none());
    }

    #[tokio::test]
    async fn test_delivers_arguments() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let handler = recording(&seen);
        let update = text_update(1, 5, "/start@mybot extra args");
        assert!(handler.matches(&update));

        handler
            .handle(Context::new(MockBot::new(), Arc::new(update)))
            .await
            .unwrap();
        assert_eq!(seen.lock()[0].args, vec!["extra", "args"]);
    }

    #[test]
    fn test_exact_name_match() {
        let handler = recording(&Arc::new(Mutex::new(Vec::new())));
        assert!(!handler.matches(&text_update(1, 5, "/other")));
        assert!(!handler.matches(&text_update(1, 5, "/Start")));
        assert!(!handler.matches(&text_update(1, 5, "/started")));
        assert!(!handler.matches(&text_update(1, 5, "start")));
        assert!(!handler.matches(&callback_update(1, 5, "/start")));
    }

    #[test]
    fn test_bot_username_filters_mentions() {
        let handler = recording(&Arc::new(Mutex::new(Vec::new()))).bot_username("@MyBot");
        assert!(handler.matches(&text_update(1, 5, "/start")));
        assert!(handler.matches(&text_update(1, 5, "/start@mybot")));
        assert!(!handler.matches(&text_update(1, 5, "/start@otherbot")));
    }

    #[test]
    fn test_edited_messages_are_opt_in() {
        let handler = recording(&Arc::new(Mutex::new(Vec::new())));
        let mut update = text_update(1, 5, "/start");
        if let UpdateKind::Message(m) = update.kind {
            update.kind = UpdateKind::EditedMessage(m);
        }
        assert!(!handler.matches(&update));
        assert!(handler.allow_edited(true).matches(&update));
    }

    #[test]
    fn test_group_assignment() {
        let handler = recording(&Arc::new(Mutex::new(Vec::new())));
        assert_eq!(Handler::group(&handler), DEFAULT_GROUP);
        let handler = handler.group("admin");
        assert_eq!(Handler::group(&handler), "admin");
    }
}
