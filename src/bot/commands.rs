use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

fn all_commands() -> Vec<CreateCommand> {
    vec![play_command(), queue_command(), skip_command(), stop_command()]
}

/// Registers the slash commands globally
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }

    Ok(())
}

/// Registers the slash commands on a single guild, visible immediately
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;

    Ok(())
}

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Play a song or add it to the queue")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL or search terms",
            )
            .required(true),
        )
}

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Show the current queue")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skip to the next song")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Stop playback and clear the queue")
}
