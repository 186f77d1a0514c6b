use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{bot::MusicBot, error::MusicError, music::Caller, ui::embeds};

/// Handles slash commands
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &MusicBot) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Command used outside of a guild"))?;

    info!(
        "📝 Command /{} used by {} in guild {}",
        command.data.name, command.user.name, guild_id
    );

    let caller = Caller {
        guild_id,
        user_id: command.user.id,
        voice_channel_id: user_voice_channel(ctx, guild_id, command.user.id),
    };

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, &caller).await?,
        "queue" => handle_queue(ctx, &command, bot, &caller).await?,
        "skip" => handle_skip(ctx, &command, bot, &caller).await?,
        "stop" => handle_stop(ctx, &command, bot, &caller).await?,
        _ => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content("❌ Unknown command")
                            .ephemeral(true),
                    ),
                )
                .await?;
        }
    }

    Ok(())
}

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    caller: &Caller,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Missing query option"))?;

    // Resolution can take several seconds
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let embed = match bot.controller.play(caller, query).await {
        Ok(track) => embeds::track_added_embed(&track),
        Err(e) => {
            warn!("⚠️ /play '{}' failed in guild {}: {}", query, caller.guild_id, e);
            embeds::error_embed(&e.user_message())
        }
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    caller: &Caller,
) -> Result<()> {
    let embed = match bot.controller.queue(caller.guild_id) {
        Ok(tracks) => embeds::queue_embed(&tracks, bot.config.queue_display_limit),
        Err(e) => embeds::info_embed(&e.user_message()),
    };

    respond(ctx, command, embed).await
}

async fn handle_skip(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    caller: &Caller,
) -> Result<()> {
    let embed = match bot.controller.skip(caller) {
        Ok(()) => embeds::success_embed("⏭️ Skipped"),
        Err(e) => reply_for(&e),
    };

    respond(ctx, command, embed).await
}

async fn handle_stop(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    caller: &Caller,
) -> Result<()> {
    let embed = match bot.controller.stop(caller).await {
        Ok(_) => embeds::success_embed("⏹️ Stopped, queue cleared"),
        Err(e) => reply_for(&e),
    };

    respond(ctx, command, embed).await
}

/// Command outcomes that are not failures get a neutral reply
fn reply_for(error: &MusicError) -> CreateEmbed {
    match error {
        MusicError::NoNextTrack | MusicError::QueueEmpty => embeds::info_embed(&error.user_message()),
        _ => embeds::error_embed(&error.user_message()),
    }
}

async fn respond(ctx: &Context, command: &CommandInteraction, embed: CreateEmbed) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;

    Ok(())
}

/// Voice channel the user is connected to, read from the cache
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
