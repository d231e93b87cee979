//! Discord gateway integration: event handling, command registration and
//! voice channel lifecycle.

pub mod commands;
pub mod handlers;

use std::sync::Arc;

use anyhow::Result;
use serenity::{
    async_trait,
    model::{
        application::Interaction,
        gateway::Ready,
        id::{ChannelId, GuildId},
        voice::VoiceState,
    },
    prelude::{Context, EventHandler},
};
use tracing::{error, info, warn};

use crate::{
    audio::Player, config::Config, library::MusicLibrary, playlists::PlaylistStore,
};

pub struct JukeboxBot {
    pub config: Arc<Config>,
    pub library: Arc<tokio::sync::RwLock<MusicLibrary>>,
    pub playlists: Arc<tokio::sync::Mutex<PlaylistStore>>,
    pub player: Arc<Player>,
}

impl JukeboxBot {
    pub fn new(
        config: Arc<Config>,
        library: Arc<tokio::sync::RwLock<MusicLibrary>>,
        playlists: Arc<tokio::sync::Mutex<PlaylistStore>>,
        player: Arc<Player>,
    ) -> Self {
        Self {
            config,
            library,
            playlists,
            player,
        }
    }

    /// Connects to a voice channel and hands the call to the player.
    pub async fn join_voice(
        &self,
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<()> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird not initialized"))?;

        let call = manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to join voice channel: {e}"))?;

        self.player.register_call(guild_id, call);
        info!("🔊 Joined voice channel {} in guild {}", channel_id, guild_id);
        Ok(())
    }

    pub async fn leave_voice(&self, ctx: &Context, guild_id: GuildId) -> Result<()> {
        let manager = songbird::get(ctx)
            .await
            .ok_or_else(|| anyhow::anyhow!("Songbird not initialized"))?;

        self.player.remove_guild(guild_id);
        manager.remove(guild_id).await?;

        info!("👋 Left voice channel in guild {}", guild_id);
        Ok(())
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🚀 {} connected to Discord", ready.user.name);

        let result = match self.config.guild_id {
            Some(guild_id) => {
                info!("⚡ Registering commands in guild {} (dev mode)", guild_id);
                commands::register_guild_commands(&ctx, GuildId::new(guild_id)).await
            }
            None => {
                info!("🌍 Registering global commands");
                commands::register_global_commands(&ctx).await
            }
        };

        match result {
            Ok(()) => info!("✅ Slash commands registered"),
            Err(e) => error!("❌ Failed to register commands: {e}"),
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            let name = command.data.name.clone();
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("❌ Command /{} failed: {e}", name);
            }
        }
    }

    /// Drops per-guild playback state when the bot itself leaves or is
    /// disconnected from a voice channel.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let bot_id = ctx.cache.current_user().id;
        if new.user_id != bot_id {
            return;
        }

        if new.channel_id.is_none() {
            let old_guild = old.as_ref().and_then(|state| state.guild_id);
            if let Some(guild_id) = disconnected_guild(old_guild, new.guild_id) {
                warn!("🔌 Disconnected from voice in guild {}, clearing state", guild_id);
                self.player.remove_guild(guild_id);
            }
        }
    }
}

/// Guild to tear down after a disconnect. The gateway does not always hand
/// us the cached prior state, so the event's own guild is the fallback.
fn disconnected_guild(old: Option<GuildId>, new: Option<GuildId>) -> Option<GuildId> {
    old.or(new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnect_teardown_falls_back_to_event_guild() {
        let a = GuildId::new(1);
        let b = GuildId::new(2);

        assert_eq!(disconnected_guild(Some(a), Some(b)), Some(a));
        assert_eq!(disconnected_guild(Some(a), None), Some(a));
        // No cached prior state: the event itself names the guild.
        assert_eq!(disconnected_guild(None, Some(b)), Some(b));
        assert_eq!(disconnected_guild(None, None), None);
    }
}
