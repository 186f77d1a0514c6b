//! # Bot Module
//!
//! Discord glue for tunequeue.
//!
//! - Slash command registration ([`commands`])
//! - Command dispatch and replies ([`handlers`])
//! - Cleanup when the bot loses its voice connection
//!
//! All music state lives behind [`MusicController`]; this module only
//! translates Discord events into controller calls.

use anyhow::Result;
use serenity::{
    all::{ChannelId, Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;

use crate::{config::Config, music::MusicController};

/// Serenity event handler owning the controller.
pub struct MusicBot {
    config: Arc<Config>,
    pub controller: Arc<MusicController>,
}

impl MusicBot {
    pub fn new(config: Arc<Config>, controller: Arc<MusicController>) -> Self {
        Self { config, controller }
    }

    /// Registers slash commands on the configured guild, or globally.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registering slash commands...");
        info!("🔧 Application ID: {}", self.config.application_id);

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ The bot is not a member of guild {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .map_err(|e| {
                        error!("❌ Error registering guild commands: {:?}", e);
                        anyhow::anyhow!(
                            "Could not register guild commands. Check the bot has the 'applications.commands' scope in the guild."
                        )
                    })?;
                info!("✅ Guild commands registered for {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await?;
                info!("✅ Global commands registered (may take up to an hour to show up)");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} guilds", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error registering commands: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error handling command: {:?}", e);
            }
        }
    }

    /// Resets a guild when the bot itself was disconnected from voice
    /// (kicked, or its channel deleted).
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        let Some(guild_id) = new.guild_id else {
            return;
        };

        // Leaves made by the bot itself are echoed here too, possibly after a
        // newer call for the same guild was opened
        let mut current_channel = None;
        if let Some(manager) = songbird::get(&ctx).await {
            if let Some(call) = manager.get(guild_id) {
                current_channel = call
                    .lock()
                    .await
                    .current_channel()
                    .map(|channel_id| ChannelId::from(channel_id.0));
            }
        }

        info!("🔌 Bot disconnected from voice in guild {}", guild_id);
        self.controller.disconnect(guild_id, current_channel).await;
    }
}
