use tracing::Level;
use tracing_subscriber::fmt::time::ChronoLocal;

use nimbus_live::transport::config::Config;
use nimbus_live::{SessionConfig, SessionState};

/// Voice-only conversation against the default microphone and speakers.
/// Requires GEMINI_API_KEY in the environment. Ctrl-C ends the session.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    if std::env::var("GEMINI_API_KEY").is_err() {
        eprintln!("GEMINI_API_KEY must be set");
        std::process::exit(1);
    }
    let session = nimbus_live::native::live_session(Config::new());

    let mut states = session.state();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            println!("state: {:?}", *states.borrow());
        }
    });

    let mut captions = session.captions();
    tokio::spawn(async move {
        while captions.changed().await.is_ok() {
            let caption = captions.borrow().clone();
            if !caption.is_empty() {
                println!("you: {} | model: {}", caption.user, caption.model);
            }
        }
    });

    session
        .start(SessionConfig::new())
        .await
        .expect("failed to start session");
    println!("session active, speak into the microphone (Ctrl-C to stop)");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!("stopping...");
        }
        _ = async {
            let mut states = session.state();
            loop {
                if states.changed().await.is_err() {
                    break;
                }
                let state = *states.borrow();
                if matches!(state, SessionState::Closed | SessionState::Errored) {
                    break;
                }
            }
        } => {
            if let Some(error) = session.last_error().borrow().clone() {
                eprintln!("session ended with error: {}", error);
            }
        }
    }

    session.stop().await;

    for (index, turn) in session.turns().borrow().iter().enumerate() {
        println!("turn {}:", index + 1);
        println!("  you:   {}", turn.user_text);
        println!("  model: {}", turn.model_text);
    }
}
