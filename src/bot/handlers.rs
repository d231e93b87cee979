//! Slash-command dispatch: translates interactions into calls on the
//! library, the playlist store and the player, and renders the results.

use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::{CommandDataOption, CommandDataOptionValue, CommandInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::info;

use crate::{
    audio::{LoopMode, SessionError},
    bot::JukeboxBot,
    library::Track,
    sources,
    ui::embeds,
};

pub async fn handle_command(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    // Globally registered commands are reachable from DMs; everything that
    // touches guild state gets turned away up front.
    if requires_guild(&command.data.name) && command.guild_id.is_none() {
        return respond_ephemeral(ctx, &command, "❌ This command only works in a server").await;
    }

    info!("📝 /{} used by {}", command.data.name, command.user.name);

    match command.data.name.as_str() {
        "play" => handle_play(ctx, command, bot, false).await,
        "playnext" => handle_play(ctx, command, bot, true).await,
        "playurl" => handle_playurl(ctx, command, bot).await,
        "skip" => handle_skip(ctx, command, bot).await,
        "stop" => handle_stop(ctx, command, bot).await,
        "queue" => handle_queue(ctx, command, bot).await,
        "clear" => handle_clear(ctx, command, bot).await,
        "shuffle" => handle_shuffle(ctx, command, bot).await,
        "remove" => handle_remove(ctx, command, bot).await,
        "volume" => handle_volume(ctx, command, bot).await,
        "loop" => handle_loop(ctx, command, bot).await,
        "nowplaying" => handle_nowplaying(ctx, command, bot).await,
        "search" => handle_search(ctx, command, bot).await,
        "list" => handle_list(ctx, command, bot).await,
        "refresh" => handle_refresh(ctx, command, bot).await,
        "setserver" => handle_setserver(ctx, command, bot).await,
        "serverinfo" => handle_serverinfo(ctx, command, bot).await,
        "playlist" => handle_playlist(ctx, command, bot).await,
        "join" => handle_join(ctx, command, bot).await,
        "leave" => handle_leave(ctx, command, bot).await,
        "help" => handle_help(ctx, command).await,
        _ => respond_ephemeral(ctx, &command, "❌ Unknown command").await,
    }
}

// Playback

async fn handle_play(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
    play_next: bool,
) -> Result<()> {
    let guild_id = required_guild(&command)?;
    let query = option_str(&command.data.options, "query")
        .ok_or_else(|| anyhow::anyhow!("Missing query option"))?
        .to_string();

    defer(ctx, &command).await?;

    let track = {
        let library = bot.library.read().await;
        library.search(&query).into_iter().next()
    };

    let Some(track) = track else {
        return edit(ctx, &command, format!("❌ No results found for: {query}")).await;
    };

    if let Err(e) = ensure_connected(ctx, bot, guild_id, command.user.id).await {
        return edit(ctx, &command, format!("❌ {e}")).await;
    }

    match bot.player.enqueue(guild_id, track.clone(), play_next).await {
        Ok(()) => {
            let embed = embeds::track_added_embed(&track, play_next);
            command
                .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
                .await?;
        }
        Err(e) => edit(ctx, &command, format!("❌ {e}")).await?,
    }

    Ok(())
}

async fn handle_playurl(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let guild_id = required_guild(&command)?;
    let url = option_str(&command.data.options, "url")
        .ok_or_else(|| anyhow::anyhow!("Missing url option"))?
        .to_string();

    if !sources::is_http_url(&url) {
        return respond_ephemeral(ctx, &command, "❌ Please provide a valid HTTP/HTTPS URL").await;
    }

    defer(ctx, &command).await?;

    if let Err(e) = ensure_connected(ctx, bot, guild_id, command.user.id).await {
        return edit(ctx, &command, format!("❌ {e}")).await;
    }

    let track = Track::from_url(&url);
    match bot.player.enqueue(guild_id, track.clone(), false).await {
        Ok(()) => {
            let embed = embeds::track_added_embed(&track, false);
            command
                .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
                .await?;
        }
        Err(e) => edit(ctx, &command, format!("❌ {e}")).await?,
    }

    Ok(())
}

async fn handle_skip(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let guild_id = required_guild(&command)?;

    match bot.player.skip(guild_id) {
        Ok(track) => respond(ctx, &command, format!("⏭️ Skipped: {}", track.title)).await,
        Err(e) => respond_ephemeral(ctx, &command, format!("❌ {e}")).await,
    }
}

async fn handle_stop(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let guild_id = required_guild(&command)?;

    if !bot.player.is_connected(guild_id) {
        return respond_ephemeral(ctx, &command, "❌ Not in a voice channel").await;
    }

    bot.player.stop(guild_id);
    respond(ctx, &command, "⏹️ Stopped playback and cleared queue").await
}

// Queue

async fn handle_queue(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let guild_id = required_guild(&command)?;

    let snapshot = bot.player.snapshot(guild_id).unwrap_or_default();
    respond_embed(ctx, &command, embeds::queue_embed(&snapshot)).await
}

async fn handle_clear(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let guild_id = required_guild(&command)?;

    let dropped = bot.player.clear_queue(guild_id);
    respond(ctx, &command, format!("🗑️ Queue cleared ({dropped} tracks)")).await
}

async fn handle_shuffle(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let guild_id = required_guild(&command)?;

    match bot.player.shuffle(guild_id) {
        Ok(_) => respond(ctx, &command, "🔀 Queue shuffled").await,
        Err(SessionError::EmptyQueue) => {
            respond_ephemeral(ctx, &command, "❌ Queue is empty").await
        }
        Err(e) => respond_ephemeral(ctx, &command, format!("❌ {e}")).await,
    }
}

async fn handle_remove(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let guild_id = required_guild(&command)?;
    let position = option_i64(&command.data.options, "position").unwrap_or(0);

    if position < 1 {
        return respond_ephemeral(ctx, &command, "❌ Position must be at least 1").await;
    }

    match bot.player.remove_at(guild_id, position as usize) {
        Ok(track) => respond(ctx, &command, format!("🗑️ Removed from queue: {}", track.title)).await,
        Err(e) => respond_ephemeral(ctx, &command, format!("❌ {e}")).await,
    }
}

async fn handle_volume(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let guild_id = required_guild(&command)?;
    let level = option_i64(&command.data.options, "level")
        .ok_or_else(|| anyhow::anyhow!("Missing level option"))?;

    match bot.player.set_volume(guild_id, level as f32 / 100.0) {
        Ok(()) => {
            respond(
                ctx,
                &command,
                format!("🔊 Volume set to {level}% (applies from the next track)"),
            )
            .await
        }
        Err(e) => respond_ephemeral(ctx, &command, format!("❌ {e}")).await,
    }
}

async fn handle_loop(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let guild_id = required_guild(&command)?;
    let mode_index = option_i64(&command.data.options, "mode").unwrap_or(-1);

    match LoopMode::from_index(mode_index) {
        Ok(mode) => {
            bot.player.set_loop(guild_id, mode);
            respond(ctx, &command, format!("🔁 Loop mode set to {}", mode.as_str())).await
        }
        Err(e) => respond_ephemeral(ctx, &command, format!("❌ {e}")).await,
    }
}

async fn handle_nowplaying(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let guild_id = required_guild(&command)?;

    let Some(snapshot) = bot.player.snapshot(guild_id) else {
        return respond_ephemeral(ctx, &command, "❌ Nothing is currently playing").await;
    };
    let Some(track) = &snapshot.current_track else {
        return respond_ephemeral(ctx, &command, "❌ Nothing is currently playing").await;
    };

    let mode = LoopMode::from_index(snapshot.loop_mode as i64).unwrap_or(LoopMode::Off);
    respond_embed(
        ctx,
        &command,
        embeds::now_playing_embed(track, snapshot.volume, mode),
    )
    .await
}

// Library

async fn handle_search(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let query = option_str(&command.data.options, "query")
        .ok_or_else(|| anyhow::anyhow!("Missing query option"))?
        .to_string();

    let results = {
        let library = bot.library.read().await;
        library.search(&query)
    };

    if results.is_empty() {
        return respond_ephemeral(ctx, &command, format!("❌ No results found for: {query}")).await;
    }

    respond_embed(ctx, &command, embeds::search_results_embed(&query, &results)).await
}

async fn handle_list(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let (tracks, total) = {
        let library = bot.library.read().await;
        (
            library.all().iter().take(20).cloned().collect::<Vec<_>>(),
            library.len(),
        )
    };

    if tracks.is_empty() {
        return respond_ephemeral(ctx, &command, "❌ No tracks available").await;
    }

    respond_embed(ctx, &command, embeds::library_embed(&tracks, total)).await
}

async fn handle_refresh(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    defer(ctx, &command).await?;

    let (refreshed, total) = {
        let mut library = bot.library.write().await;
        let refreshed = library.refresh().await;
        (refreshed, library.len())
    };

    if refreshed {
        edit(ctx, &command, format!("✅ Library refreshed! {total} tracks available")).await
    } else {
        edit(ctx, &command, "❌ Failed to refresh library").await
    }
}

async fn handle_setserver(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let url = option_str(&command.data.options, "url")
        .ok_or_else(|| anyhow::anyhow!("Missing url option"))?
        .to_string();

    if !sources::is_http_url(&url) {
        return respond_ephemeral(ctx, &command, "❌ Please provide a valid HTTP/HTTPS URL").await;
    }

    bot.player.resolver().set_server_url(&url);
    respond(
        ctx,
        &command,
        format!("🎵 Music server URL updated to: {}", url.trim_end_matches('/')),
    )
    .await
}

async fn handle_serverinfo(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let url = bot.player.resolver().server_url();
    respond(ctx, &command, format!("🎵 Current music server: {url}")).await
}

// Playlists

async fn handle_playlist(
    ctx: &Context,
    command: CommandInteraction,
    bot: &JukeboxBot,
) -> Result<()> {
    let user_id = command.user.id.to_string();

    let Some((subcommand, options)) = subcommand(&command.data.options) else {
        return respond_ephemeral(ctx, &command, "❌ Unknown playlist action").await;
    };

    match subcommand.as_str() {
        "create" => {
            let name = required_option(&options, "name")?;
            let created = bot.playlists.lock().await.create(&user_id, &name).await;
            if created {
                respond(ctx, &command, format!("📋 Created playlist: {name}")).await
            } else {
                respond_ephemeral(ctx, &command, format!("❌ Playlist {name} already exists")).await
            }
        }
        "add" => {
            let name = required_option(&options, "name")?;
            let query = required_option(&options, "query")?;

            let track = {
                let library = bot.library.read().await;
                library.search(&query).into_iter().next()
            };
            let Some(track) = track else {
                return respond_ephemeral(ctx, &command, format!("❌ No results found for: {query}"))
                    .await;
            };

            let title = track.title.clone();
            let added = bot
                .playlists
                .lock()
                .await
                .add_track(&user_id, &name, track)
                .await;
            if added {
                respond(ctx, &command, format!("✅ Added {title} to {name}")).await
            } else {
                respond_ephemeral(ctx, &command, format!("❌ Playlist {name} not found")).await
            }
        }
        "remove" => {
            let name = required_option(&options, "name")?;
            let query = required_option(&options, "query")?;

            let playlist = bot.playlists.lock().await.get(&user_id, &name).cloned();
            let Some(playlist) = playlist else {
                return respond_ephemeral(ctx, &command, format!("❌ Playlist {name} not found"))
                    .await;
            };

            let needle = query.to_lowercase();
            let Some(track) = playlist
                .tracks
                .iter()
                .find(|t| t.title.to_lowercase().contains(&needle))
                .cloned()
            else {
                return respond_ephemeral(
                    ctx,
                    &command,
                    format!("❌ No track matching '{query}' in {name}"),
                )
                .await;
            };

            bot.playlists
                .lock()
                .await
                .remove_track(&user_id, &name, &track.id)
                .await;
            respond(ctx, &command, format!("🗑️ Removed {} from {name}", track.title)).await
        }
        "play" => {
            let name = required_option(&options, "name")?;
            let guild_id = required_guild(&command)?;

            defer(ctx, &command).await?;

            let tracks = {
                let playlists = bot.playlists.lock().await;
                playlists.get(&user_id, &name).map(|p| p.tracks.clone())
            };
            let Some(tracks) = tracks else {
                return edit(ctx, &command, format!("❌ Playlist {name} not found")).await;
            };
            if tracks.is_empty() {
                return edit(ctx, &command, format!("❌ Playlist {name} is empty")).await;
            }

            if let Err(e) = ensure_connected(ctx, bot, guild_id, command.user.id).await {
                return edit(ctx, &command, format!("❌ {e}")).await;
            }

            let mut queued = 0usize;
            for track in tracks {
                match bot.player.enqueue(guild_id, track, false).await {
                    Ok(()) => queued += 1,
                    Err(SessionError::QueueFull(_)) => break,
                    Err(e) => return edit(ctx, &command, format!("❌ {e}")).await,
                }
            }

            edit(ctx, &command, format!("🎵 Queued {queued} tracks from playlist: {name}")).await
        }
        "list" => {
            let playlists = bot.playlists.lock().await.get_all(&user_id);
            if playlists.is_empty() {
                respond_ephemeral(ctx, &command, "❌ You have no playlists").await
            } else {
                respond_embed(ctx, &command, embeds::playlists_embed(&playlists)).await
            }
        }
        "delete" => {
            let name = required_option(&options, "name")?;
            let deleted = bot.playlists.lock().await.delete(&user_id, &name).await;
            if deleted {
                respond(ctx, &command, format!("🗑️ Deleted playlist: {name}")).await
            } else {
                respond_ephemeral(ctx, &command, format!("❌ Playlist {name} not found")).await
            }
        }
        _ => respond_ephemeral(ctx, &command, "❌ Unknown playlist action").await,
    }
}

// Voice

async fn handle_join(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let guild_id = required_guild(&command)?;

    match user_voice_channel(ctx, guild_id, command.user.id) {
        Ok(channel_id) => {
            bot.join_voice(ctx, guild_id, channel_id).await?;
            respond(ctx, &command, "🔊 Joined your voice channel").await
        }
        Err(e) => respond_ephemeral(ctx, &command, format!("❌ {e}")).await,
    }
}

async fn handle_leave(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let guild_id = required_guild(&command)?;

    if !bot.player.is_connected(guild_id) {
        return respond_ephemeral(ctx, &command, "❌ Not in a voice channel").await;
    }

    bot.leave_voice(ctx, guild_id).await?;
    respond(ctx, &command, "👋 Left the voice channel").await
}

async fn handle_help(ctx: &Context, command: CommandInteraction) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::help_embed())
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

// Helpers

/// Everything except `help` operates on guild state.
fn requires_guild(name: &str) -> bool {
    name != "help"
}

fn required_guild(command: &CommandInteraction) -> Result<GuildId> {
    command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Command used outside a guild"))
}

fn option_str<'a>(options: &'a [CommandDataOption], name: &str) -> Option<&'a str> {
    options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn option_i64(options: &[CommandDataOption], name: &str) -> Option<i64> {
    options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

fn required_option(options: &[CommandDataOption], name: &str) -> Result<String> {
    option_str(options, name)
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Missing {name} option"))
}

/// First subcommand with its nested options.
fn subcommand(options: &[CommandDataOption]) -> Option<(String, Vec<CommandDataOption>)> {
    options.first().and_then(|opt| match &opt.value {
        CommandDataOptionValue::SubCommand(nested) => Some((opt.name.clone(), nested.clone())),
        _ => None,
    })
}

/// Voice channel the user currently sits in; errors when they are not in
/// one. Cache-only lookup, no awaits while the guild ref is held.
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Result<ChannelId> {
    let guild = guild_id
        .to_guild_cached(&ctx.cache)
        .ok_or_else(|| anyhow::anyhow!("Guild not found in cache"))?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or_else(|| anyhow::anyhow!("You need to be in a voice channel"))
}

/// Joins the caller's voice channel unless already connected.
async fn ensure_connected(
    ctx: &Context,
    bot: &JukeboxBot,
    guild_id: GuildId,
    user_id: UserId,
) -> Result<()> {
    if bot.player.is_connected(guild_id) {
        return Ok(());
    }

    let channel_id = user_voice_channel(ctx, guild_id, user_id)?;
    bot.join_voice(ctx, guild_id, channel_id).await
}

async fn defer(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;
    Ok(())
}

async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    content: impl Into<String>,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(content.into()),
            ),
        )
        .await?;
    Ok(())
}

async fn respond_ephemeral(
    ctx: &Context,
    command: &CommandInteraction,
    content: impl Into<String>,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content.into())
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

async fn respond_embed(
    ctx: &Context,
    command: &CommandInteraction,
    embed: serenity::builder::CreateEmbed,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().embed(embed),
            ),
        )
        .await?;
    Ok(())
}

async fn edit(
    ctx: &Context,
    command: &CommandInteraction,
    content: impl Into<String>,
) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(content.into()))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::requires_guild;

    #[test]
    fn only_help_is_usable_outside_a_guild() {
        assert!(!requires_guild("help"));

        for name in ["play", "queue", "playlist", "join", "serverinfo"] {
            assert!(requires_guild(name), "{name} should be guild-only");
        }
    }
}
