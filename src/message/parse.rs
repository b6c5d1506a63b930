//! Nom-based IRC line parser.
//!
//! Produces a borrowed [`ParsedMessage`]; the owned [`super::Message`] form
//! is built on top of it.

use nom::{
    bytes::complete::{take_until, take_while1},
    character::complete::{char, space0},
    combinator::opt,
    error::{context, VerboseError},
    sequence::preceded,
    IResult,
};

use crate::error::MessageParseError;

type ParseResult<I, O> = IResult<I, O, VerboseError<I>>;

/// Parse IRCv3 message tags (the part after `@` and before the first space).
fn parse_tags(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing IRCv3 message tags",
        preceded(char('@'), take_until(" ")),
    )(input)
}

/// Parse message prefix (the part after `:` and before the first space).
fn parse_prefix(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing message prefix",
        preceded(char(':'), take_while1(|c| c != ' ')),
    )(input)
}

/// Parse the command name (alphanumeric characters).
fn parse_command(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing IRC command",
        take_while1(|c: char| c.is_alphanumeric()),
    )(input)
}

fn parse_message(input: &str) -> ParseResult<&str, ParsedMessage<'_>> {
    let (input, tags) = opt(parse_tags)(input)?;
    let (input, _) = space0(input)?;

    let (input, prefix) = opt(parse_prefix)(input)?;
    let (input, _) = space0(input)?;

    let (input, command) = parse_command(input)?;

    // Parameters, including the `:`-introduced trailing parameter.
    let mut params: Vec<&str> = Vec::new();
    let mut rest = input;

    while let Some(b' ') = rest.as_bytes().first().copied() {
        rest = &rest[1..];

        if let Some(b':') = rest.as_bytes().first().copied() {
            // Trailing parameter: everything after `:` until line end.
            let after_colon = &rest[1..];
            let end = after_colon.find(['\r', '\n']).unwrap_or(after_colon.len());
            params.push(&after_colon[..end]);
            rest = &after_colon[end..];
            break;
        } else {
            // Regular parameter: until next space or line end.
            let mut end = rest.len();
            if let Some(i) = rest.find(' ') {
                end = end.min(i);
            }
            if let Some(i) = rest.find('\r') {
                end = end.min(i);
            }
            if let Some(i) = rest.find('\n') {
                end = end.min(i);
            }
            let param = &rest[..end];
            if param.is_empty() {
                break;
            }
            params.push(param);
            rest = &rest[end..];
        }
    }

    Ok((
        rest,
        ParsedMessage {
            tags,
            prefix,
            command,
            params,
        },
    ))
}

/// A parsed IRC message with borrowed string slices.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct ParsedMessage<'a> {
    /// Raw tags string (without the leading `@`), if present.
    pub tags: Option<&'a str>,
    /// Raw prefix string (without the leading `:`), if present.
    pub prefix: Option<&'a str>,
    /// The command name.
    pub command: &'a str,
    /// Command parameters, including trailing.
    pub params: Vec<&'a str>,
}

impl<'a> ParsedMessage<'a> {
    /// Parse an IRC line into a `ParsedMessage`.
    pub fn parse(input: &'a str) -> Result<Self, MessageParseError> {
        if input.trim_end_matches(['\r', '\n']).is_empty() {
            return Err(MessageParseError::EmptyMessage);
        }

        match parse_message(input) {
            Ok((_remaining, msg)) => Ok(msg),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let mut context_info = None;
                let mut position = input.len();

                for (error_input, error_kind) in &e.errors {
                    position = input.len() - error_input.len();
                    if let nom::error::VerboseErrorKind::Context(ctx) = error_kind {
                        context_info = Some(*ctx);
                    }
                }

                match context_info {
                    Some("parsing IRC command") | None => Err(MessageParseError::InvalidCommand),
                    Some(ctx) => Err(MessageParseError::ParseContext {
                        position,
                        context: ctx.to_string(),
                    }),
                }
            }
            Err(nom::Err::Incomplete(_)) => Err(MessageParseError::ParseContext {
                position: input.len(),
                context: "incomplete input".to_string(),
            }),
        }
    }
}
