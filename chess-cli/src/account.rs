//! Account and history commands.

use session::{default_bots, GameRecordRepository};

use crate::app::App;

pub fn list_bots() {
    for bot in default_bots() {
        println!("{:<10} {}", bot.slug, bot.name);
    }
}

pub async fn history(app: &App, limit: usize) -> anyhow::Result<()> {
    let records = app.records.records().await?;
    if records.is_empty() {
        println!("No games recorded yet.");
        return Ok(());
    }
    for record in records.iter().take(limit) {
        println!(
            "{:<8} {:<12} {:<10} {:>3} moves  {}",
            format!("{:?}", record.mode),
            record.username,
            record.result,
            record.moves.len(),
            record.id
        );
    }
    Ok(())
}

pub fn login(app: &App, username: &str, password: &str) -> anyhow::Result<()> {
    let session = app.auth.login(username, password)?;
    println!("Logged in as {} ({:?}).", session.username, session.role);
    Ok(())
}

pub fn register(app: &App, username: &str, password: &str) -> anyhow::Result<()> {
    let session = app.auth.register(username, password)?;
    println!("Registered and logged in as {}.", session.username);
    Ok(())
}

pub fn logout(app: &App) -> anyhow::Result<()> {
    app.auth.logout()?;
    println!("Logged out.");
    Ok(())
}

pub fn whoami(app: &App) {
    match app.auth.session() {
        Some(session) => println!("{} ({:?})", session.username, session.role),
        None => println!("Not logged in."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use session::{AppConfig, GameRecordMode};

    #[tokio::test]
    async fn test_login_then_record_shows_user() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::resolve(|key| {
            (key == "CHESS_DATA_DIR").then(|| dir.path().display().to_string())
        });
        let app = App::open(config).unwrap();
        login(&app, "usuario1", "usuario1").unwrap();
        assert!(login(&app, "usuario1", "wrong").is_err());

        app.recorder
            .record("g1", GameRecordMode::Bot, vec!["e2e4".into()], "Resignation")
            .await
            .unwrap();
        let records = app.records.records().await.unwrap();
        assert_eq!(records[0].username, "usuario1");
        history(&app, 5).await.unwrap();

        logout(&app).unwrap();
        assert!(app.auth.session().is_none());
    }
}
