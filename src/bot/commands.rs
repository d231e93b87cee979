//! Slash-command definitions and registration.

use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        playnext_command(),
        playurl_command(),
        skip_command(),
        stop_command(),
        queue_command(),
        clear_command(),
        shuffle_command(),
        remove_command(),
        volume_command(),
        loop_command(),
        nowplaying_command(),
        search_command(),
        list_command(),
        refresh_command(),
        setserver_command(),
        serverinfo_command(),
        playlist_command(),
        join_command(),
        leave_command(),
        help_command(),
    ]
}

/// Global registration; propagation takes up to an hour.
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }
    Ok(())
}

/// Per-guild registration for development; propagates within seconds.
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;
    Ok(())
}

// Playback

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Play a track from the library by name")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "query", "Search term")
                .required(true),
        )
}

fn playnext_command() -> CreateCommand {
    CreateCommand::new("playnext")
        .description("Queue a track to play right after the current one")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "query", "Search term")
                .required(true),
        )
}

fn playurl_command() -> CreateCommand {
    CreateCommand::new("playurl")
        .description("Play audio directly from a URL")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "url", "HTTP(S) audio or video URL")
                .required(true),
        )
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skip the current track")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Stop playback and clear the queue")
}

// Queue

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("Show the current queue")
}

fn clear_command() -> CreateCommand {
    CreateCommand::new("clear").description("Clear the pending queue")
}

fn shuffle_command() -> CreateCommand {
    CreateCommand::new("shuffle").description("Shuffle the pending queue")
}

fn remove_command() -> CreateCommand {
    CreateCommand::new("remove")
        .description("Remove a track from the queue")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::Integer,
                "position",
                "Queue position (1 = next up)",
            )
            .min_int_value(1)
            .required(true),
        )
}

fn volume_command() -> CreateCommand {
    CreateCommand::new("volume")
        .description("Set playback volume (0-200)")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "level", "Volume level (0-200)")
                .required(true),
        )
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop")
        .description("Set the loop mode")
        .add_option(
            CreateCommandOption::new(CommandOptionType::Integer, "mode", "Loop mode")
                .add_int_choice("Off", 0)
                .add_int_choice("Track", 1)
                .add_int_choice("Queue", 2)
                .required(true),
        )
}

fn nowplaying_command() -> CreateCommand {
    CreateCommand::new("nowplaying").description("Show the currently playing track")
}

// Library

fn search_command() -> CreateCommand {
    CreateCommand::new("search")
        .description("Search the music library")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "query", "Search term")
                .required(true),
        )
}

fn list_command() -> CreateCommand {
    CreateCommand::new("list").description("List available tracks")
}

fn refresh_command() -> CreateCommand {
    CreateCommand::new("refresh").description("Refresh the library from the music server")
}

fn setserver_command() -> CreateCommand {
    CreateCommand::new("setserver")
        .description("Set the music server URL")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "url", "Server base URL")
                .required(true),
        )
}

fn serverinfo_command() -> CreateCommand {
    CreateCommand::new("serverinfo").description("Show the current music server URL")
}

// Playlists

fn playlist_command() -> CreateCommand {
    CreateCommand::new("playlist")
        .description("Manage your playlists")
        .add_option(
            CreateCommandOption::new(CommandOptionType::SubCommand, "create", "Create a playlist")
                .add_sub_option(
                    CreateCommandOption::new(CommandOptionType::String, "name", "Playlist name")
                        .required(true),
                ),
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "add",
                "Add a track to a playlist",
            )
            .add_sub_option(
                CreateCommandOption::new(CommandOptionType::String, "name", "Playlist name")
                    .required(true),
            )
            .add_sub_option(
                CreateCommandOption::new(CommandOptionType::String, "query", "Search term")
                    .required(true),
            ),
        )
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::SubCommand,
                "remove",
                "Remove a track from a playlist",
            )
            .add_sub_option(
                CreateCommandOption::new(CommandOptionType::String, "name", "Playlist name")
                    .required(true),
            )
            .add_sub_option(
                CreateCommandOption::new(CommandOptionType::String, "query", "Search term")
                    .required(true),
            ),
        )
        .add_option(
            CreateCommandOption::new(CommandOptionType::SubCommand, "play", "Queue a playlist")
                .add_sub_option(
                    CreateCommandOption::new(CommandOptionType::String, "name", "Playlist name")
                        .required(true),
                ),
        )
        .add_option(CreateCommandOption::new(
            CommandOptionType::SubCommand,
            "list",
            "List your playlists",
        ))
        .add_option(
            CreateCommandOption::new(CommandOptionType::SubCommand, "delete", "Delete a playlist")
                .add_sub_option(
                    CreateCommandOption::new(CommandOptionType::String, "name", "Playlist name")
                        .required(true),
                ),
        )
}

// Voice

fn join_command() -> CreateCommand {
    CreateCommand::new("join").description("Join your voice channel")
}

fn leave_command() -> CreateCommand {
    CreateCommand::new("leave").description("Leave the voice channel")
}

fn help_command() -> CreateCommand {
    CreateCommand::new("help").description("Show command help")
}
