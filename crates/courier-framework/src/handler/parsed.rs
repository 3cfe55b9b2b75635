//! Commands whose arguments are parsed with clap.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use clap::Parser;
use courier_core::Update;
use tracing::debug;

use super::{Action, DEFAULT_GROUP, Handler, action, incoming_message, parse_command};
use crate::context::Context;
use crate::error::{HandlerError, HandlerResult};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Splits a command line into arguments the way a POSIX shell would for
/// plain words, single quotes and double quotes with backslash escapes.
pub fn shell_split(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut quote = Quote::None;
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (Quote::None, c) if c.is_whitespace() => {
                if in_word {
                    args.push(std::mem::take(&mut word));
                    in_word = false;
                }
            }
            (Quote::None, '\'') => {
                quote = Quote::Single;
                in_word = true;
            }
            (Quote::None, '"') => {
                quote = Quote::Double;
                in_word = true;
            }
            (Quote::Single, '\'') | (Quote::Double, '"') => quote = Quote::None,
            (Quote::Double, '\\') => {
                if let Some(next) = chars.next() {
                    word.push(next);
                }
            }
            (_, c) => {
                word.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        args.push(word);
    }
    args
}

/// A command whose arguments are parsed into `T` with clap.
///
/// By default the handler only matches when the arguments parse. With
/// [`reply_on_error`](Self::reply_on_error) it matches on the command name
/// alone and answers malformed invocations with clap's rendered error or
/// help text instead of running the action.
///
/// ```rust,ignore
/// #[derive(clap::Parser)]
/// struct Remind {
///     minutes: u32,
///     text: Vec<String>,
/// }
///
/// let remind = ParsedCommandHandler::<Remind>::new("remind", |ctx, args| async move {
///     ctx.reply(&format!("in {} min", args.minutes)).await?;
///     Ok(())
/// })
/// .reply_on_error(true);
/// ```
pub struct ParsedCommandHandler<T> {
    command: String,
    reply_on_error: bool,
    group: String,
    action: Action<T>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Parser + Send + 'static> ParsedCommandHandler<T> {
    pub fn new<F, Fut>(command: impl Into<String>, f: F) -> Self
    where
        F: Fn(Context, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            command: command.into(),
            reply_on_error: false,
            group: DEFAULT_GROUP.to_string(),
            action: action(f),
            _marker: PhantomData,
        }
    }

    /// Answers parse failures in the chat instead of ignoring the command.
    pub fn reply_on_error(mut self, reply: bool) -> Self {
        self.reply_on_error = reply;
        self
    }

    fn parse(&self, update: &Update) -> Option<Result<T, clap::Error>> {
        let text = incoming_message(update, false)?.text.as_deref()?;
        let input = parse_command(text)?;
        if input.name != self.command {
            return None;
        }
        let rest = text
            .trim_start()
            .split_once(char::is_whitespace)
            .map_or("", |(_, rest)| rest);
        let argv = std::iter::once(self.command.clone()).chain(shell_split(rest));
        Some(T::try_parse_from(argv))
    }
}

impl<T> ParsedCommandHandler<T> {
    /// Assigns the handler to a group.
    pub fn group(mut self, tag: impl Into<String>) -> Self {
        self.group = tag.into();
        self
    }
}

#[async_trait]
impl<T: Parser + Send + 'static> Handler for ParsedCommandHandler<T> {
    fn name(&self) -> &str {
        &self.command
    }

    fn group(&self) -> &str {
        &self.group
    }

    fn matches(&self, update: &Update) -> bool {
        match self.parse(update) {
            Some(Ok(_)) => true,
            Some(Err(_)) => self.reply_on_error,
            None => false,
        }
    }

    async fn handle(&self, ctx: Context) -> HandlerResult {
        match self.parse(ctx.update()) {
            Some(Ok(args)) => (self.action)(ctx, args).await,
            Some(Err(err)) => {
                debug!(command = %self.command, kind = ?err.kind(), "Command arguments rejected");
                ctx.reply(err.render().to_string().trim_end()).await?;
                Ok(())
            }
            None => Err(HandlerError::MissingPayload("command")),
        }
    }
}
