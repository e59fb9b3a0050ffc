//! Template variable substitution.

use crate::command::domain::{
    BotIdentity, ChannelRef, ExecutionContext, GroupRef, InvocationOrigin, UserRef,
};
use mockable::Clock;
use rand::Rng;
use serde::Serialize;

const DM_LABEL: &str = "DM";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    UserName,
    UserId,
    UserMention,
    DisplayName,
    Avatar,
    GroupName,
    GroupId,
    MemberCount,
    GroupIcon,
    ChannelName,
    ChannelId,
    ChannelMention,
    BotName,
    BotId,
    BotMention,
    Prefix,
    Time,
    Date,
    DateTime,
    Day,
    Month,
    Year,
    Random,
    Coin,
    Args,
}

impl Token {
    const fn description(self) -> &'static str {
        match self {
            Self::UserName => "Name of the invoking user",
            Self::UserId => "Identifier of the invoking user",
            Self::UserMention => "Mention of the invoking user",
            Self::DisplayName => "Display name of the invoking user",
            Self::Avatar => "Avatar URL of the invoking user",
            Self::GroupName => "Server name, or DM",
            Self::GroupId => "Server identifier, or DM",
            Self::MemberCount => "Server member count, or 1 in a DM",
            Self::GroupIcon => "Server icon URL",
            Self::ChannelName => "Channel name, or DM",
            Self::ChannelId => "Channel identifier",
            Self::ChannelMention => "Channel mention",
            Self::BotName => "Name of the bot",
            Self::BotId => "Identifier of the bot",
            Self::BotMention => "Mention of the bot",
            Self::Prefix => "Command prefix",
            Self::Time => "Current time (HH:MM:SS)",
            Self::Date => "Current date (YYYY-MM-DD)",
            Self::DateTime => "Current date and time",
            Self::Day => "Current weekday",
            Self::Month => "Current month",
            Self::Year => "Current year",
            Self::Random => "Random number from 1 to 100",
            Self::Coin => "Heads or Tails",
            Self::Args => "Every argument, space separated",
        }
    }
}

/// A token accepted in response templates, as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenDescription {
    /// Token as written in a template, including the `$`.
    pub token: String,
    /// What the token resolves to.
    pub description: &'static str,
}

const VOCABULARY: &[(&str, Token)] = &[
    ("username", Token::UserName),
    ("user", Token::UserName),
    ("userid", Token::UserId),
    ("mention", Token::UserMention),
    ("usermention", Token::UserMention),
    ("displayname", Token::DisplayName),
    ("avatar", Token::Avatar),
    ("servername", Token::GroupName),
    ("server", Token::GroupName),
    ("serverid", Token::GroupId),
    ("membercount", Token::MemberCount),
    ("members", Token::MemberCount),
    ("servericon", Token::GroupIcon),
    ("channel", Token::ChannelName),
    ("channelid", Token::ChannelId),
    ("channelmention", Token::ChannelMention),
    ("botname", Token::BotName),
    ("bot", Token::BotName),
    ("botid", Token::BotId),
    ("botmention", Token::BotMention),
    ("prefix", Token::Prefix),
    ("time", Token::Time),
    ("date", Token::Date),
    ("datetime", Token::DateTime),
    ("day", Token::Day),
    ("month", Token::Month),
    ("year", Token::Year),
    ("random", Token::Random),
    ("coin", Token::Coin),
    ("args", Token::Args),
];

/// Resolves `$token` placeholders in response templates.
///
/// Named tokens match longest-first, so `$userid` is never read as `$user`
/// followed by `id`. `$random(min,max)` draws an inclusive integer, and
/// `$argN` yields the N-th argument or an empty string. Anything else that
/// starts with `$` is copied through unchanged.
///
/// # Examples
///
/// ```
/// use botvisor::command::services::VariableSubstitutionEngine;
/// use mockable::DefaultClock;
///
/// let engine = VariableSubstitutionEngine::new();
/// let preview = engine.preview("hi $username, $random(3,3)", &DefaultClock);
/// assert_eq!(preview, "hi PreviewUser, 3");
/// ```
#[derive(Debug, Clone)]
pub struct VariableSubstitutionEngine {
    vocabulary: Vec<(&'static str, Token)>,
    default_random_range: (i64, i64),
}

impl Default for VariableSubstitutionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl VariableSubstitutionEngine {
    /// Creates an engine with the full token vocabulary.
    #[must_use]
    pub fn new() -> Self {
        let mut vocabulary = VOCABULARY.to_vec();
        vocabulary.sort_by_key(|(name, _)| std::cmp::Reverse(name.len()));
        Self {
            vocabulary,
            default_random_range: (1, 100),
        }
    }

    /// Lists every token the engine resolves, in documentation order.
    ///
    /// Parameterised forms are listed last as `$argN` and
    /// `$random(min,max)`.
    #[must_use]
    pub fn vocabulary() -> Vec<TokenDescription> {
        VOCABULARY
            .iter()
            .map(|(name, token)| TokenDescription {
                token: format!("${name}"),
                description: token.description(),
            })
            .chain([
                TokenDescription {
                    token: "$argN".to_owned(),
                    description: "N-th argument, or empty when missing",
                },
                TokenDescription {
                    token: "$random(min,max)".to_owned(),
                    description: "Random integer between min and max inclusive",
                },
            ])
            .collect()
    }

    /// Resolves every recognised token in `template` against `context`.
    ///
    /// Neither input is modified. Templates without tokens come back
    /// unchanged.
    #[must_use]
    pub fn resolve(&self, template: &str, context: &ExecutionContext) -> String {
        let mut output = String::with_capacity(template.len());
        let mut rest = template;
        while let Some((before, after)) = rest.split_once('$') {
            output.push_str(before);
            if let Some((value, remainder)) = self.expand(after, context) {
                output.push_str(&value);
                rest = remainder;
            } else {
                output.push('$');
                rest = after;
            }
        }
        output.push_str(rest);
        output
    }

    /// Resolves `template` against a built-in sample context.
    #[must_use]
    pub fn preview(&self, template: &str, clock: &impl Clock) -> String {
        self.resolve(template, &sample_context(clock))
    }

    fn expand<'a>(&self, after: &'a str, context: &ExecutionContext) -> Option<(String, &'a str)> {
        if let Some((low, high, remainder)) = parse_random_range(after) {
            return Some((random_between(low, high).to_string(), remainder));
        }
        if let Some((position, remainder)) = parse_positional(after) {
            let value = context.arg(position).unwrap_or_default().to_owned();
            return Some((value, remainder));
        }
        self.vocabulary.iter().find_map(|(name, token)| {
            after
                .strip_prefix(name)
                .map(|remainder| (self.value(*token, context), remainder))
        })
    }

    fn value(&self, token: Token, context: &ExecutionContext) -> String {
        let group = context.group.as_ref();
        match token {
            Token::UserName => context.user.name.clone(),
            Token::UserId => context.user.id.clone(),
            Token::UserMention => context.user.mention(),
            Token::DisplayName => context.user.shown_name().to_owned(),
            Token::Avatar => context.user.avatar_url.clone().unwrap_or_default(),
            Token::GroupName => group.map_or_else(|| DM_LABEL.to_owned(), |g| g.name.clone()),
            Token::GroupId => group.map_or_else(|| DM_LABEL.to_owned(), |g| g.id.clone()),
            Token::MemberCount => group.map_or(1, |g| g.member_count).to_string(),
            Token::GroupIcon => group.and_then(|g| g.icon_url.clone()).unwrap_or_default(),
            Token::ChannelName => context
                .channel
                .name
                .clone()
                .unwrap_or_else(|| DM_LABEL.to_owned()),
            Token::ChannelId => context.channel.id.clone(),
            Token::ChannelMention => context.channel.mention(),
            Token::BotName => context.bot.name.clone(),
            Token::BotId => context.bot.id.clone(),
            Token::BotMention => context.bot.mention(),
            Token::Prefix => context.prefix.clone(),
            Token::Time => context.timestamp.format("%H:%M:%S").to_string(),
            Token::Date => context.timestamp.format("%Y-%m-%d").to_string(),
            Token::DateTime => context.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            Token::Day => context.timestamp.format("%A").to_string(),
            Token::Month => context.timestamp.format("%B").to_string(),
            Token::Year => context.timestamp.format("%Y").to_string(),
            Token::Random => {
                let (low, high) = self.default_random_range;
                random_between(low, high).to_string()
            }
            Token::Coin => if rand::rng().random_bool(0.5) {
                "Heads"
            } else {
                "Tails"
            }
            .to_owned(),
            Token::Args => context.raw_args(),
        }
    }
}

/// Parses `random(min,max)` at the start of `text`.
fn parse_random_range(text: &str) -> Option<(i64, i64, &str)> {
    let inner_and_rest = text.strip_prefix("random(")?;
    let (inner, remainder) = inner_and_rest.split_once(')')?;
    let (low, high) = inner.split_once(',')?;
    Some((low.trim().parse().ok()?, high.trim().parse().ok()?, remainder))
}

/// Parses `argN` (N >= 1) at the start of `text`.
fn parse_positional(text: &str) -> Option<(usize, &str)> {
    let digits_and_rest = text.strip_prefix("arg")?;
    let digit_count = digits_and_rest
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    let (digits, remainder) = digits_and_rest.split_at_checked(digit_count)?;
    let position: usize = digits.parse().ok()?;
    (position > 0).then_some((position, remainder))
}

fn random_between(first: i64, second: i64) -> i64 {
    let (low, high) = if first <= second {
        (first, second)
    } else {
        (second, first)
    };
    rand::rng().random_range(low..=high)
}

fn sample_context(clock: &impl Clock) -> ExecutionContext {
    let origin = InvocationOrigin {
        user: UserRef::new("123456789", "PreviewUser").with_display_name("Preview User"),
        group: Some(GroupRef::new("987654321", "Preview Server", 150)),
        channel: ChannelRef::named("555555555", "general"),
    };
    ExecutionContext::new(
        origin,
        BotIdentity::new("111111111", "PreviewBot"),
        "!",
        "preview",
        vec!["first".to_owned(), "second".to_owned()],
        clock,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Local, TimeZone, Utc};
    use rstest::{fixture, rstest};

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn local(&self) -> DateTime<Local> {
            self.0.with_timezone(&Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[fixture]
    fn engine() -> VariableSubstitutionEngine {
        VariableSubstitutionEngine::new()
    }

    #[fixture]
    fn context() -> ExecutionContext {
        let clock = FixedClock(
            Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
                .single()
                .expect("valid timestamp"),
        );
        let origin = InvocationOrigin {
            user: UserRef::new("42", "alice"),
            group: Some(GroupRef::new("7", "Guild", 12)),
            channel: ChannelRef::named("99", "general"),
        };
        ExecutionContext::new(
            origin,
            BotIdentity::new("1", "helper"),
            "!",
            "greet",
            vec!["one".to_owned(), "two".to_owned()],
            &clock,
        )
    }

    #[rstest]
    fn random_range_of_width_one_is_deterministic(
        engine: VariableSubstitutionEngine,
        context: ExecutionContext,
    ) {
        assert_eq!(
            engine.resolve("$username says $random(1,1)", &context),
            "alice says 1"
        );
    }

    #[rstest]
    #[case("plain text")]
    #[case("costs 5$ or $$")]
    #[case("$unknown and $ alone")]
    #[case("")]
    fn templates_without_known_tokens_are_unchanged(
        engine: VariableSubstitutionEngine,
        context: ExecutionContext,
        #[case] template: &str,
    ) {
        assert_eq!(engine.resolve(template, &context), template);
    }

    #[rstest]
    #[case("$userid", "42")]
    #[case("$usermention", "<@42>")]
    #[case("$servername/$serverid/$membercount", "Guild/7/12")]
    #[case("$channel $channelid $channelmention", "general 99 <#99>")]
    #[case("$botname $botid $prefix", "helper 1 !")]
    #[case("$date $time", "2024-03-09 14:05:07")]
    #[case("$day $month $year", "Saturday March 2024")]
    #[case("[$args] [$arg2] [$arg3]", "[one two] [two] []")]
    #[case("$users", "alices")]
    fn resolves_vocabulary_longest_first(
        engine: VariableSubstitutionEngine,
        context: ExecutionContext,
        #[case] template: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(engine.resolve(template, &context), expected);
    }

    #[rstest]
    fn direct_messages_use_fallbacks(engine: VariableSubstitutionEngine, mut context: ExecutionContext) {
        context.group = None;
        context.channel = ChannelRef::direct("5");

        assert_eq!(
            engine.resolve("$server $serverid $members $channel", &context),
            "DM DM 1 DM"
        );
    }

    #[rstest]
    fn reversed_random_bounds_are_swapped(
        engine: VariableSubstitutionEngine,
        context: ExecutionContext,
    ) {
        for _ in 0..50 {
            let value: i64 = engine
                .resolve("$random(5, 3)", &context)
                .parse()
                .expect("numeric output");
            assert!((3..=5).contains(&value));
        }
    }

    #[rstest]
    fn vocabulary_lists_every_resolvable_token(
        engine: VariableSubstitutionEngine,
        context: ExecutionContext,
    ) {
        let vocabulary = VariableSubstitutionEngine::vocabulary();

        assert_eq!(vocabulary.len(), VOCABULARY.len() + 2);
        assert!(vocabulary.iter().any(|entry| entry.token == "$random(min,max)"));
        for entry in vocabulary.iter().filter(|entry| !entry.token.contains(['(', 'N'])) {
            assert_ne!(
                engine.resolve(&entry.token, &context),
                entry.token,
                "{} was not resolved",
                entry.token
            );
        }
    }

    #[rstest]
    fn resolve_does_not_mutate_context(engine: VariableSubstitutionEngine, context: ExecutionContext) {
        let before = context.clone();
        let _resolved = engine.resolve("$username $arg1 $random", &context);
        assert_eq!(context, before);
    }
}
