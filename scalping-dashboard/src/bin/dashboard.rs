/// Scalping Dashboard - Terminal UI for the scalping bot
///
/// Polls the bot's JSON API and renders:
/// - Account, open positions and bot status
/// - Indicators with EMA trend arrows, alignment and regime
/// - Performance, risk limits and circuit breaker
/// - Recent trades and the signal log
///
/// Keys: [m] trade mode, [f] signal filter, [h] signal window, [r] refresh, [q] quit
use std::{
    error::Error,
    io,
    time::{Duration, Instant},
};

use chrono::Utc;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use scalping_dashboard::{
    init_logging, log_path_from_env, render_dashboard, Dashboard, DashboardConfig,
    HttpFeedSource, Scheduler,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging(&log_path_from_env())?;

    let config = DashboardConfig::from_env();
    let source = HttpFeedSource::new(&config)?;
    info!(url = %source.base(), "starting scalping dashboard");

    let dashboard = Dashboard::new(source, config.clone());
    if let Err(error) = dashboard.probe_health().await {
        warn!(%error, "health probe failed, polling anyway");
    }

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        error!(%info, "dashboard panicked");
        original_hook(info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let schedulers = [
        Scheduler::new("refresh", config.refresh_interval).spawn(dashboard.refresh_job()),
        Scheduler::new("countdown", config.countdown_tick)
            .with_immediate(false)
            .spawn(dashboard.countdown_job()),
        Scheduler::new("signals", config.signals_interval).spawn(dashboard.signals_job()),
    ];

    let mut last_draw: Option<Instant> = None;
    let draw_interval = Duration::from_millis(250);

    let result: Result<(), Box<dyn Error>> = loop {
        if event::poll(Duration::from_millis(5))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break Ok(()),
                    KeyCode::Char('m') | KeyCode::Char('M') => {
                        let d = dashboard.clone();
                        tokio::spawn(async move { d.cycle_trade_mode().await });
                    }
                    KeyCode::Char('f') | KeyCode::Char('F') => {
                        dashboard.cycle_signal_filter().await;
                        last_draw = None;
                    }
                    KeyCode::Char('h') | KeyCode::Char('H') => {
                        let d = dashboard.clone();
                        tokio::spawn(async move { d.cycle_signal_hours().await });
                    }
                    KeyCode::Char('r') | KeyCode::Char('R') => {
                        let d = dashboard.clone();
                        tokio::spawn(async move { d.refresh_now().await });
                    }
                    _ => {}
                }
            }
        }

        if last_draw.map_or(true, |t| t.elapsed() >= draw_interval) {
            let snapshot = dashboard.snapshot().await;
            terminal.draw(|f| {
                render_dashboard(f, f.area(), &snapshot, dashboard.config(), Utc::now());
            })?;
            last_draw = Some(Instant::now());
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    for scheduler in schedulers {
        scheduler.stop().await;
    }
    info!("scalping dashboard stopped");
    result
}
