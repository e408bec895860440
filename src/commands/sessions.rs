use crate::cli::SessionCommand;
use crate::error::Result;
use crate::studio::Studio;
use colored::Colorize;
use prettytable::{format, Table};

/// Handle session commands
pub async fn handle_sessions(studio: &Studio, command: SessionCommand) -> Result<()> {
    match command {
        SessionCommand::List => {
            let sessions = studio.list_sessions()?;

            if sessions.is_empty() {
                println!("{}", "No design sessions found.".yellow());
                return Ok(());
            }

            let mut table = Table::new();
            table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

            table.add_row(prettytable::row![
                "ID".bold(),
                "Name".bold(),
                "Messages".bold(),
                "Images".bold(),
                "Last Updated".bold()
            ]);

            for session in sessions {
                let messages = studio.storage().list_messages(&session.id)?.len();
                let images = studio.storage().list_images(&session.id)?.len();
                let updated = session.updated_at.format("%Y-%m-%d %H:%M").to_string();

                table.add_row(prettytable::row![
                    short_id(&session.id).cyan(),
                    truncate(&session.name, 40),
                    messages,
                    images,
                    updated
                ]);
            }

            println!("\nDesign Sessions:");
            table.printstd();
            println!();
            println!(
                "Use {} to continue a session.",
                "inkforge generate --session <ID> \"<request>\"".cyan()
            );
            println!();
        }
        SessionCommand::New { name } => {
            let session = studio.create_session(&name)?;
            println!(
                "{} {} ({})",
                "Created session".green(),
                session.id.cyan(),
                session.name
            );
        }
        SessionCommand::Show { id, json } => {
            let Some(snapshot) = studio.select_session(&id)? else {
                println!("{}", format!("Session {} not found", id).yellow());
                return Ok(());
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
                return Ok(());
            }

            println!(
                "\n{} {}",
                snapshot.session.name.bold(),
                format!("({})", snapshot.session.id).dimmed()
            );
            println!(
                "Created {}",
                snapshot.session.created_at.format("%Y-%m-%d %H:%M")
            );
            println!();

            if snapshot.messages.is_empty() {
                println!("{}", "No messages yet.".yellow());
            }
            for message in &snapshot.messages {
                let time = message.created_at.format("%H:%M:%S");
                match &message.image_id {
                    Some(image_id) => {
                        let path = snapshot
                            .images
                            .iter()
                            .find(|image| &image.id == image_id)
                            .map(|image| image.path.display().to_string())
                            .unwrap_or_else(|| "-".to_string());
                        println!(
                            "{} {} {} {}",
                            time.to_string().dimmed(),
                            "image".magenta(),
                            image_id.cyan(),
                            path
                        );
                    }
                    None => println!("{} {}", time.to_string().dimmed(), message.content),
                }
            }
            println!();
        }
        SessionCommand::Delete { id } => {
            if studio.delete_session(&id).await? {
                println!("{}", format!("Deleted session {}", id).green());
            } else {
                println!("{}", format!("Session {} not found", id).yellow());
            }
        }
    }

    Ok(())
}

fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars - 3).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
