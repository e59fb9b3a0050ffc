//! End-to-end invocation through the in-memory gateway.

use super::helpers::{Harness, WAIT, bot_id, harness, texts};
use botvisor::command::domain::{ChannelRef, CommandDefinition, CommandKind, UserRef};
use botvisor::instance::{domain::CommandUsage, ports::SlashInvocation};
use rstest::rstest;

fn script(id: &str, source: &str) -> CommandDefinition {
    CommandDefinition::code(id, CommandKind::CodeBased, source)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn simple_command_replies_with_substituted_text(harness: Harness) {
    harness
        .start_ready("pinger", &[CommandDefinition::simple("ping", "pong $username")])
        .await;

    let replies = harness.say("pinger", "alice", "!ping", 1).await;

    assert_eq!(texts(&replies), vec!["pong alice".to_owned()]);
    assert_eq!(
        replies.first().map(|reply| reply.channel_id.as_str()),
        Some("c1")
    );
    let state = harness
        .supervisor
        .status(&bot_id("pinger"))
        .expect("instance supervised");
    assert_eq!(state.commands_invoked(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unmatched_and_unprefixed_messages_are_ignored(harness: Harness) {
    harness
        .start_ready("quiet", &[CommandDefinition::simple("ping", "pong")])
        .await;

    harness.say("quiet", "bob", "ping", 0).await;
    harness.say("quiet", "bob", "!unknown", 0).await;
    harness.say("quiet", "bob", "!  ping", 0).await;
    let replies = harness.say("quiet", "bob", "!ping", 1).await;

    assert_eq!(texts(&replies), vec!["pong".to_owned()]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn script_command_sees_arguments(harness: Harness) {
    harness
        .start_ready(
            "scripted",
            &[script(
                "echo",
                "bot.command('echo', function(ctx)\n  ctx:sleep(5)\n  return 'echo ' .. ctx.raw_args\nend)",
            )],
        )
        .await;

    let replies = harness.say("scripted", "carol", "!echo one two", 1).await;

    assert_eq!(texts(&replies), vec!["echo one two".to_owned()]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn slow_handler_does_not_block_later_invocations(harness: Harness) {
    harness
        .start_ready(
            "busy",
            &[
                script(
                    "slow",
                    "bot.command('slow', function(ctx)\n  ctx:sleep(400)\n  return 'slow done'\nend)",
                ),
                CommandDefinition::simple("fast", "fast done"),
            ],
        )
        .await;

    harness.say("busy", "dave", "!slow", 0).await;
    let replies = harness.say("busy", "dave", "!fast", 2).await;

    assert_eq!(
        texts(&replies),
        vec!["fast done".to_owned(), "slow done".to_owned()]
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn handler_failure_is_reported_and_isolated(harness: Harness) {
    harness
        .start_ready(
            "fragile",
            &[
                script(
                    "boom",
                    "bot.command('boom', function(ctx) error('exploded') end)",
                ),
                CommandDefinition::simple("ping", "still here"),
            ],
        )
        .await;

    let failure = harness.say("fragile", "erin", "!boom", 1).await;
    let recovery = harness.say("fragile", "erin", "!ping", 2).await;

    let notice = texts(&failure).concat();
    assert!(notice.starts_with("Error: "));
    assert!(notice.contains("exploded"));
    assert_eq!(
        recovery.last().map(|reply| reply.content.as_str()),
        Some("still here")
    );
    let state = harness
        .supervisor
        .status(&bot_id("fragile"))
        .expect("instance supervised");
    assert!(state.last_error().is_some_and(|error| error.contains("exploded")));
    assert!(state.is_ready());
    assert_eq!(
        state.usage_of("boom"),
        CommandUsage {
            invocations: 1,
            errors: 1
        }
    );
    assert_eq!(state.usage_of("ping").errors, 0);
    assert_eq!(state.error_count(), 1);
    assert!(state.last_active().is_some());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn slash_commands_are_synced_and_dispatched(harness: Harness) {
    harness
        .start_ready(
            "slasher",
            &[CommandDefinition::code(
                "info",
                CommandKind::SlashCodeBased,
                "bot.slash_command('info', 'Shows info', function(ctx)\n  return 'info for ' .. ctx.user.name\nend)",
            )],
        )
        .await;

    let synced = harness
        .gateway
        .synced_slash_commands(&bot_id("slasher"))
        .expect("gateway readable");
    harness
        .gateway
        .deliver_slash(
            &bot_id("slasher"),
            SlashInvocation {
                author: UserRef::new("u9", "frank"),
                group: None,
                channel: ChannelRef::direct("dm-9"),
                name: "info".to_owned(),
                options: Vec::new(),
            },
        )
        .expect("slash delivered");
    let replies = harness
        .gateway
        .wait_for_replies(1, WAIT)
        .await
        .expect("replies readable");

    assert_eq!(synced, vec!["info".to_owned()]);
    assert_eq!(texts(&replies), vec!["info for frank".to_owned()]);
    harness.say("slasher", "frank", "!info", 1).await;
    assert_eq!(
        harness.gateway.replies().expect("replies readable").len(),
        1
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn bots_keep_their_own_command_sets(harness: Harness) {
    harness
        .start_ready("red", &[CommandDefinition::simple("colour", "red")])
        .await;
    harness
        .start_ready("blue", &[CommandDefinition::simple("colour", "blue")])
        .await;

    harness.say("red", "gina", "!colour", 1).await;
    let replies = harness.say("blue", "gina", "!colour", 2).await;

    let by_bot: Vec<(String, String)> = replies
        .iter()
        .map(|reply| (reply.bot_id.to_string(), reply.content.clone()))
        .collect();
    assert_eq!(
        by_bot,
        vec![
            ("red".to_owned(), "red".to_owned()),
            ("blue".to_owned(), "blue".to_owned()),
        ]
    );
}
