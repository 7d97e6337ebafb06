//! Debug surface: HTML status page and registry stats.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::{Html, IntoResponse};

use crate::state::AppState;

/// Serve a minimal HTML page showing live room and session counts.
///
/// # Route
///
/// `GET /`
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.registry.stats().await;
    let instance = &state.registry.context().instance_id;

    let room_rows: String = stats
        .rooms
        .iter()
        .map(|room| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                room.room_id, room.sessions, room.tick, room.seq
            )
        })
        .collect();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Kasagi Engine</title>
    <style>
        body {{
            background: #f4f6f5;
            color: #24312b;
            font-family: -apple-system, 'Segoe UI', 'Helvetica Neue', sans-serif;
            line-height: 1.5;
            margin: 0;
            padding: 3rem 1.5rem;
        }}
        main {{ max-width: 640px; margin: 0 auto; }}
        h1 {{
            font-size: 1.6rem;
            letter-spacing: 0.02em;
            border-bottom: 3px solid #1d7a63;
            padding-bottom: 0.5rem;
        }}
        .instance {{ color: #5d6b64; font-size: 0.9rem; }}
        .up {{ color: #1d7a63; font-weight: 600; }}
        dl {{
            display: grid;
            grid-template-columns: repeat(2, minmax(0, 1fr));
            gap: 0.75rem;
            margin: 1.5rem 0;
        }}
        dl > div {{
            background: #ffffff;
            border-left: 4px solid #1d7a63;
            border-radius: 3px;
            box-shadow: 0 1px 2px rgba(36, 49, 43, 0.12);
            padding: 0.75rem 1rem;
        }}
        dt {{ color: #5d6b64; font-size: 0.8rem; text-transform: uppercase; }}
        dd {{ font-size: 1.75rem; font-weight: 600; margin: 0; }}
        table {{ border-collapse: collapse; width: 100%; }}
        th {{
            text-align: left;
            color: #5d6b64;
            font-size: 0.8rem;
            text-transform: uppercase;
        }}
        th, td {{ padding: 0.5rem 0.75rem; }}
        td {{
            background: #ffffff;
            border-top: 1px solid #dde4e1;
            font-variant-numeric: tabular-nums;
        }}
        code {{ background: #e7edea; border-radius: 3px; padding: 0.1rem 0.35rem; }}
        a {{ color: #1d7a63; }}
    </style>
</head>
<body>
    <main>
        <h1>Kasagi Engine</h1>
        <p class="instance">Instance <code>{instance}</code> &middot; <span class="up">up</span></p>

        <dl>
            <div><dt>Rooms</dt><dd>{total_rooms}</dd></div>
            <div><dt>Sessions</dt><dd>{total_sessions}</dd></div>
        </dl>

        <table>
            <thead>
                <tr><th>Room</th><th>Sessions</th><th>Tick</th><th>Seq</th></tr>
            </thead>
            <tbody>
                {room_rows}
            </tbody>
        </table>

        <h2>Endpoints</h2>
        <p><code>ws://host:port/ws</code> &mdash; sync socket</p>
        <p><a href="/api/stats">/api/stats</a> &mdash; registry statistics (JSON)</p>
    </main>
</body>
</html>"#,
        total_rooms = stats.total_rooms,
        total_sessions = stats.total_sessions,
    ))
}

/// Return room registry statistics as JSON.
///
/// # Route
///
/// `GET /api/stats`
pub async fn get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.registry.stats().await)
}
