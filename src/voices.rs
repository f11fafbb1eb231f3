/// Map a voice identifier from the host to the engine's speaker index.
///
/// The host addresses voices as `"1"` through `"4"`; anything else falls back
/// to the first speaker.
pub fn speaker_for_voice(voice_id: &str) -> i64 {
    match voice_id {
        "1" => 0,
        "2" => 1,
        "3" => 2,
        "4" => 3,
        _ => 0,
    }
}
