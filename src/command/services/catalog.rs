//! Catalog of command blueprints offered to operators.

use crate::command::domain::{
    CommandDefinition, CommandKind, CommandTemplate, fill_placeholders,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors returned while instantiating a blueprint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    /// No blueprint of `kind` is called `name`.
    #[error("no {kind} template named '{name}'")]
    UnknownTemplate {
        /// Requested kind.
        kind: CommandKind,
        /// Requested name.
        name: String,
    },
}

/// Blueprints keyed by kind and name.
///
/// A catalog is configuration data: it is built once (from
/// [`TemplateCatalog::builtin`] or a configuration file) and handed to the
/// services that need it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CommandTemplate>", into = "Vec<CommandTemplate>")]
pub struct TemplateCatalog {
    templates: BTreeMap<(CommandKind, String), CommandTemplate>,
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl From<Vec<CommandTemplate>> for TemplateCatalog {
    fn from(templates: Vec<CommandTemplate>) -> Self {
        Self::new(templates)
    }
}

impl From<TemplateCatalog> for Vec<CommandTemplate> {
    fn from(catalog: TemplateCatalog) -> Self {
        catalog.templates.into_values().collect()
    }
}

impl TemplateCatalog {
    /// Builds a catalog from `templates`; a later entry replaces an earlier
    /// one with the same kind and name.
    #[must_use]
    pub fn new(templates: impl IntoIterator<Item = CommandTemplate>) -> Self {
        Self {
            templates: templates
                .into_iter()
                .map(|template| ((template.kind, template.name.clone()), template))
                .collect(),
        }
    }

    /// Returns the catalog shipped with the crate.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(builtin_templates())
    }

    /// Returns the blueprint of `kind` called `name`.
    #[must_use]
    pub fn get(&self, kind: CommandKind, name: &str) -> Option<&CommandTemplate> {
        self.templates.get(&(kind, name.to_owned()))
    }

    /// Iterates over every blueprint, ordered by kind then name.
    pub fn templates(&self) -> impl Iterator<Item = &CommandTemplate> {
        self.templates.values()
    }

    /// Returns the number of blueprints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Groups blueprints by category.
    #[must_use]
    pub fn by_category(&self) -> BTreeMap<String, Vec<&CommandTemplate>> {
        let mut grouped: BTreeMap<String, Vec<&CommandTemplate>> = BTreeMap::new();
        for template in self.templates.values() {
            grouped
                .entry(template.category.clone())
                .or_default()
                .push(template);
        }
        grouped
    }

    /// Instantiates the blueprint of `kind` called `name` with `params`.
    ///
    /// The definition is not validated; callers validate it like any other
    /// definition before storing it.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownTemplate`] when no such blueprint
    /// exists.
    pub fn generate(
        &self,
        kind: CommandKind,
        name: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<CommandDefinition, CatalogError> {
        let template = self
            .get(kind, name)
            .ok_or_else(|| CatalogError::UnknownTemplate {
                kind,
                name: name.to_owned(),
            })?;
        let merged = template.merged_params(params);
        let body = fill_placeholders(&template.body, &merged);
        let description = fill_placeholders(&template.description, &merged);

        let definition = if kind.is_code_based() {
            CommandDefinition::code(template.name.clone(), kind, body)
        } else {
            let mut simple =
                CommandDefinition::simple(fill_placeholders(&template.trigger, &merged), body);
            if !template.variations.is_empty() {
                simple = simple.with_variations(
                    template
                        .variations
                        .iter()
                        .map(|variation| fill_placeholders(variation, &merged)),
                );
            }
            simple
        };
        Ok(definition.with_description(description))
    }
}

fn builtin_templates() -> Vec<CommandTemplate> {
    vec![
        CommandTemplate::simple("greeting", "hello", "Hello $mention! Welcome to **$servername**!", "basics")
            .with_description("Greets the caller")
            .with_variations([
                "Hey $username! Good to see you here!",
                "Greetings $username! Enjoy your stay!",
            ]),
        CommandTemplate::simple("goodbye", "bye", "Goodbye $username! See you soon!", "basics")
            .with_description("Says goodbye")
            .with_variations(["See you $username!", "Later $mention!"]),
        CommandTemplate::simple(
            "help",
            "commands",
            "**Available commands**\n\n- `$prefixhello` greeting\n- `$prefixinfo` bot info\n- `$prefixcommands` this list",
            "basics",
        )
        .with_description("Lists the basic commands"),
        CommandTemplate::simple(
            "info",
            "info",
            "**Bot info**\n\n- Bot: $botname\n- Server: $servername\n- Time: $time\n- Date: $date",
            "utilities",
        )
        .with_description("Shows bot information"),
        CommandTemplate::simple("ping", "ping", "Pong! The bot is up.", "utilities")
            .with_description("Checks that the bot answers")
            .with_variations(["Pong!", "Up and running."]),
        CommandTemplate::simple(
            "server",
            "server",
            "**$servername**\n\n- Members: $membercount\n- Channel: $channel",
            "information",
        )
        .with_description("Shows server information"),
        CommandTemplate::simple(
            "roll",
            "roll",
            "$username rolled **$random(1,{sides})**",
            "fun",
        )
        .with_description("Rolls a {sides}-sided die")
        .with_default("sides", "6"),
        CommandTemplate::simple("coinflip", "coin", "$username flipped a coin: **$coin**!", "fun")
            .with_description("Flips a coin"),
        CommandTemplate::simple("hug", "hug", "$username sends a warm hug!", "social")
            .with_description("Sends a virtual hug"),
        CommandTemplate::script(
            "echo",
            CommandKind::CodeBased,
            "bot.command('echo', function(ctx)\n  if ctx.raw_args == '' then\n    ctx:reply('Give me something to repeat!')\n    return\n  end\n  ctx:reply(ctx.raw_args)\nend)\n",
            "basics",
        )
        .with_description("Repeats the caller's text"),
        CommandTemplate::script(
            "dice",
            CommandKind::CodeBased,
            "bot.command('dice', function(ctx)\n  local sides = tonumber(ctx.args[1]) or {sides}\n  ctx:reply(ctx.user.name .. ' rolled ' .. math.random(1, sides) .. ' (d' .. sides .. ')')\nend)\n",
            "fun",
        )
        .with_description("Rolls a die with a chosen number of sides")
        .with_default("sides", "6"),
        CommandTemplate::script(
            "choose",
            CommandKind::CodeBased,
            "bot.command('choose', function(ctx)\n  if #ctx.args == 0 then\n    ctx:reply('Give me some options to choose from.')\n    return\n  end\n  ctx:reply('I choose: ' .. ctx.args[math.random(1, #ctx.args)])\nend)\n",
            "fun",
        )
        .with_description("Picks one of the given options"),
        CommandTemplate::script(
            "hello_slash",
            CommandKind::SlashCodeBased,
            "bot.slash_command('hello', 'Greets the caller', function(ctx)\n  ctx:reply('Hello ' .. ctx.user.mention .. '!')\nend)\n",
            "basics",
        )
        .with_description("Slash greeting"),
        CommandTemplate::script(
            "ping_slash",
            CommandKind::SlashCodeBased,
            "bot.slash_command('ping', 'Checks that the bot answers', function(ctx)\n  return 'Pong!'\nend)\n",
            "utilities",
        )
        .with_description("Slash ping"),
        CommandTemplate::script(
            "say_slash",
            CommandKind::SlashCodeBased,
            "bot.slash_command('say', 'Repeats a message', function(ctx)\n  ctx:reply(ctx.raw_args)\nend)\n",
            "basics",
        )
        .with_description("Slash echo"),
    ]
}
