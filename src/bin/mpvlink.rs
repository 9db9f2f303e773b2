use anyhow::Result;
use mpvlink_core::Player;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("Usage: mpvlink <media-file>");
        return Ok(());
    };

    let mut player = Player::new();
    if !player.is_available() {
        eprintln!("Error: mpv library not found");
        return Ok(());
    }

    let log_path = player.enable_logging(None)?;
    let status = player.play(&path)?;
    println!("loadfile status: {}", status);
    println!("{}", serde_json::to_string_pretty(&player.status())?);

    if let Some(log) = player.read_log()? {
        if !log.is_empty() {
            println!("--- engine log ({}) ---", log_path.display());
            print!("{}", log);
        }
    }

    player.shutdown();
    Ok(())
}
