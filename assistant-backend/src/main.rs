use assistant_backend::config::Config;
use assistant_backend::models::{format_session_info, SessionInfo};
use assistant_backend::AppState;
use dotenv::dotenv;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// One line of input on stdin
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Request {
    /// Run a tool within a chat turn
    Tool {
        user_id: String,
        session_id: Option<String>,
        tool: String,
        #[serde(default)]
        params: Value,
    },
    /// Look up a session
    Session { user_id: String, session_id: String },
    Stats,
}

async fn handle(state: &AppState, request: Request) -> Value {
    match request {
        Request::Tool {
            user_id,
            session_id,
            tool,
            params,
        } => {
            let turn = tokio::task::block_in_place(|| {
                state.tracker.begin_turn(&user_id, session_id.as_deref())
            });
            let session = match turn {
                Ok(record) => record,
                Err(e) => {
                    log::error!("[SESSIONS] Failed to start turn for {}: {}", user_id, e);
                    return json!({ "success": false, "error": e.to_string() });
                }
            };

            let ctx = state.tool_context(&user_id, &session.session_id);
            let result = state.tool_registry.execute(&tool, params, &ctx).await;
            json!({
                "session_id": session.session_id,
                "result": result,
            })
        }

        Request::Session { user_id, session_id } => {
            let found = tokio::task::block_in_place(|| state.sessions.get(&user_id, &session_id));
            match found {
                Ok(Some(record)) => json!({
                    "success": true,
                    "summary": format_session_info(&record),
                    "session": SessionInfo::from(record),
                }),
                Ok(None) => json!({
                    "success": false,
                    "error": format!("Session {} not found for user {}", session_id, user_id),
                }),
                Err(e) => json!({ "success": false, "error": e.to_string() }),
            }
        }

        Request::Stats => match tokio::task::block_in_place(|| state.metrics.basic_stats()) {
            Ok(stats) => json!({ "success": true, "stats": stats }),
            Err(e) => json!({ "success": false, "error": e.to_string() }),
        },
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    log::info!(
        "Starting assistant backend (notes: {}, sessions: {})",
        config.notes.db_path,
        config.sessions.db_path
    );
    let state = AppState::from_config(config)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(line) {
            Ok(request) => handle(&state, request).await,
            Err(e) => {
                log::warn!("Ignoring malformed request: {}", e);
                json!({ "success": false, "error": format!("Invalid request: {}", e) })
            }
        };

        stdout.write_all(response.to_string().as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    log::info!("stdin closed, shutting down");
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    if let Err(e) = run().await {
        log::error!("Fatal: {}", e);
        std::process::exit(1);
    }
}
