//! Discord embed rendering for player state, search results and playlists.

use std::collections::HashMap;

use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::{
    audio::{LoopMode, SessionSnapshot},
    library::Track,
    playlists::Playlist,
};

/// Standard color palette.
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_RED: Colour = Colour::from_rgb(255, 107, 107);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

const STANDARD_FOOTER: &str = "🎵 Jukebox";

/// Discord embed descriptions cap at 4096 chars; queue listings stop early
/// with a "... and N more" line well before that.
const QUEUE_DESCRIPTION_LIMIT: usize = 3500;

pub fn format_duration(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn duration_field(track: &Track) -> String {
    match track.duration_secs() {
        Some(secs) => format_duration(secs),
        None => "Unknown".to_string(),
    }
}

pub fn now_playing_embed(track: &Track, volume: f32, loop_mode: LoopMode) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Now Playing")
        .description(format!("**{}**", track.title))
        .color(colors::SUCCESS_GREEN)
        .field("🎤 Artist", &track.artist, true)
        .field("💿 Album", &track.album, true)
        .field("⏱️ Duration", duration_field(track), true)
        .field("🔊 Volume", format!("{}%", (volume * 100.0) as u32), true)
        .field("🔁 Loop", loop_mode.as_str(), true);

    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn track_added_embed(track: &Track, play_next: bool) -> CreateEmbed {
    let title = if play_next {
        "⏭️ Playing Next"
    } else {
        "✅ Added to Queue"
    };

    let mut embed = CreateEmbed::default()
        .title(title)
        .description(format!("**{}**", track.title))
        .color(colors::SUCCESS_GREEN)
        .field("🎤 Artist", &track.artist, true)
        .field("⏱️ Duration", duration_field(track), true);

    if let Some(thumbnail) = &track.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed.footer(CreateEmbedFooter::new(
        "🎵 Playback starts automatically when nothing is playing",
    ))
}

pub fn queue_embed(snapshot: &SessionSnapshot) -> CreateEmbed {
    let embed = CreateEmbed::default()
        .title("📋 Current Queue")
        .color(colors::MUSIC_RED);

    if snapshot.queue.is_empty() && snapshot.current_track.is_none() {
        return embed
            .description("😴 **The queue is empty**\n\n💡 Use `/play <song>` to add music")
            .color(colors::NEUTRAL_GRAY);
    }

    let mut description = String::new();
    if let Some(current) = &snapshot.current_track {
        description.push_str(&format!(
            "**Now Playing:** {} [{}]\n\n",
            current.title, current.artist
        ));
    }

    for (i, track) in snapshot.queue.iter().enumerate() {
        description.push_str(&format!("{}. {} [{}]\n", i + 1, track.title, track.artist));

        if description.len() > QUEUE_DESCRIPTION_LIMIT && i + 1 < snapshot.queue.len() {
            description.push_str(&format!(
                "\n... and {} more tracks",
                snapshot.queue.len() - i - 1
            ));
            break;
        }
    }

    embed
        .description(description)
        .footer(CreateEmbedFooter::new(format!(
            "{} queued • volume {}% • loop {}",
            snapshot.queue.len(),
            (snapshot.volume * 100.0) as u32,
            match LoopMode::from_index(snapshot.loop_mode as i64) {
                Ok(mode) => mode.as_str(),
                Err(_) => "off",
            }
        )))
}

pub fn search_results_embed(query: &str, results: &[Track]) -> CreateEmbed {
    let description: String = results
        .iter()
        .take(10)
        .enumerate()
        .map(|(i, track)| format!("{}. **{}** - {}\n", i + 1, track.title, track.artist))
        .collect();

    CreateEmbed::default()
        .title(format!("🔍 Search Results for '{query}'"))
        .description(description)
        .color(colors::MUSIC_RED)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn library_embed(tracks: &[Track], total: usize) -> CreateEmbed {
    let mut description: String = tracks
        .iter()
        .take(20)
        .enumerate()
        .map(|(i, track)| format!("{}. **{}** - {}\n", i + 1, track.title, track.artist))
        .collect();

    if total > 20 {
        description.push_str(&format!("\n... and {} more tracks", total - 20));
    }

    CreateEmbed::default()
        .title(format!("📚 Music Library ({total} tracks)"))
        .description(description)
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn playlists_embed(playlists: &HashMap<String, Playlist>) -> CreateEmbed {
    let mut names: Vec<&String> = playlists.keys().collect();
    names.sort();

    let description: String = names
        .iter()
        .filter_map(|name| playlists.get(*name))
        .map(|playlist| format!("**{}** ({} tracks)\n", playlist.name, playlist.tracks.len()))
        .collect();

    CreateEmbed::default()
        .title("📋 Your Playlists")
        .description(description)
        .color(colors::MUSIC_RED)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn help_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("❓ Jukebox Commands")
        .color(colors::INFO_BLUE)
        .field(
            "Playback",
            "`/play` `/playnext` `/playurl` `/skip` `/stop` `/nowplaying`",
            false,
        )
        .field(
            "Queue",
            "`/queue` `/clear` `/shuffle` `/remove` `/volume` `/loop`",
            false,
        )
        .field(
            "Library",
            "`/search` `/list` `/refresh` `/setserver` `/serverinfo`",
            false,
        )
        .field(
            "Playlists",
            "`/playlist create|add|remove|play|list|delete`",
            false,
        )
        .field("Voice", "`/join` `/leave`", false)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_format_as_minutes_seconds() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(59), "0:59");
        assert_eq!(format_duration(185), "3:05");
        assert_eq!(format_duration(3600), "60:00");
    }
}
