use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tempo_ipc::{
    read_message, socket_path, write_message, Command, IpcError, PreferenceField, Response,
    TimerStatus,
};
use tokio::io::BufReader;
use tokio::net::UnixStream;

#[derive(Parser)]
#[command(name = "tempoctl")]
#[command(about = "Control the Tempo timer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the current phase
    Start,
    /// Pause the current phase
    Pause,
    /// Start if paused, pause if running
    Toggle,
    /// Move on to the next phase without waiting
    Skip,
    /// Restart the current phase from its full duration
    Reset,
    /// Go back to the first work phase and clear the session count
    ResetAll,
    /// Get timer status
    Status,
    /// List available presets
    Presets,
    /// Apply a preset by label
    Preset { label: String },
    /// Show current preferences
    Prefs,
    /// Change a preference, e.g. `set work-minutes 30`
    Set {
        #[arg(value_parser = parse_field)]
        field: PreferenceField,
        value: String,
    },
}

fn parse_field(s: &str) -> Result<PreferenceField, String> {
    s.parse().map_err(|e: IpcError| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Convert CLI command to IPC command
    let command = match cli.command {
        Commands::Start => Command::Start,
        Commands::Pause => Command::Pause,
        Commands::Toggle => Command::Toggle,
        Commands::Skip => Command::Skip,
        Commands::Reset => Command::Reset,
        Commands::ResetAll => Command::ResetAll,
        Commands::Status => Command::Status,
        Commands::Presets => Command::Presets,
        Commands::Preset { label } => Command::ApplyPreset { label },
        Commands::Prefs => Command::Preferences,
        Commands::Set { field, value } => Command::SetPreference { field, value },
    };

    // Send command and get response
    let response = send_command(command).await?;

    // Handle response
    match response {
        Response::Ok => println!("OK"),
        Response::Status(status) => print_status(&status),
        Response::Presets(presets) => {
            for (i, preset) in presets.iter().enumerate() {
                println!(
                    "{}. {:<14} work {:>3}m  break {:>3}m  long {:>3}m  every {}",
                    i + 1,
                    preset.label,
                    preset.work_minutes,
                    preset.break_minutes,
                    preset.long_break_minutes,
                    preset.long_break_every
                );
            }
        }
        Response::Preferences(prefs) => {
            println!("work_minutes:          {}", prefs.work_minutes);
            println!("break_minutes:         {}", prefs.break_minutes);
            println!("long_break_minutes:    {}", prefs.long_break_minutes);
            println!("long_break_every:      {}", prefs.long_break_every);
            println!("auto_start_next:       {}", prefs.auto_start_next);
            println!("notifications_enabled: {}", prefs.notifications_enabled);
        }
        Response::Error(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

fn print_status(status: &TimerStatus) {
    let state = if status.is_running { "running" } else { "paused" };
    println!("Phase: {} ({})", status.phase, state);
    println!(
        "Remaining: {:02}:{:02} of {:02}:{:02}",
        status.seconds_remaining / 60,
        status.seconds_remaining % 60,
        status.total_seconds / 60,
        status.total_seconds % 60
    );
    println!("Work sessions: {}", status.completed_work_sessions);
}

async fn send_command(cmd: Command) -> Result<Response> {
    let path = socket_path();
    let stream = match UnixStream::connect(&path).await {
        Ok(stream) => stream,
        Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused
            || e.kind() == std::io::ErrorKind::NotFound =>
        {
            return Err(IpcError::ConnectionRefused.into())
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to connect to {}", path.display()))
        }
    };
    let (reader, mut writer) = stream.into_split();

    // Send command
    write_message(&mut writer, &cmd).await?;

    // Read response
    let response = read_message(&mut BufReader::new(reader)).await?;
    Ok(response)
}
