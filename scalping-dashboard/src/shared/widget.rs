//! Ratatui rendering of the dashboard view-model

use chrono::{DateTime, Local, Utc};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::shared::{
    classify::{
        EmaSeries, IndicatorView, MarketRegime, RsiBand, SignalCard, SignalStrength, Tone,
        Volatility, VolatilityScale, VolumeActivity,
    },
    config::DashboardConfig,
    dashboard::DashboardState,
    format::{format_clock, format_fixed, format_timestamp},
    panels::{BarLevel, Cell, ProgressBar, TradesBody},
    signal_log::SignalBody,
    types::{Side, TradingMode},
};

const C_BUY: Color = Color::Rgb(100, 220, 100); // Green
const C_SELL: Color = Color::Rgb(220, 100, 100); // Red
const C_NEUTRAL: Color = Color::Rgb(180, 180, 100); // Yellow
const C_DIM: Color = Color::Rgb(120, 120, 120); // Gray
const C_BRIGHT: Color = Color::Rgb(220, 220, 220); // White
const C_ACCENT: Color = Color::Rgb(100, 180, 220); // Cyan
const C_HEADER: Color = Color::Rgb(180, 130, 220); // Purple

fn tone_color(tone: Tone) -> Color {
    match tone {
        Tone::Positive => C_BUY,
        Tone::Negative => C_SELL,
        Tone::Neutral => C_BRIGHT,
    }
}

fn side_color(side: Side) -> Color {
    match side {
        Side::Long => C_BUY,
        Side::Short => C_SELL,
        Side::Unknown => C_DIM,
    }
}

fn cell(cell: &Cell) -> Span<'static> {
    Span::styled(cell.text.clone(), Style::default().fg(tone_color(cell.tone)))
}

fn label(text: &str) -> Span<'static> {
    Span::styled(format!("{text:<14}"), Style::default().fg(C_DIM))
}

fn dim(text: impl Into<String>) -> Line<'static> {
    Line::from(Span::styled(text.into(), Style::default().fg(C_DIM)))
}

fn panel(title: &str, color: Color) -> Block<'static> {
    Block::default()
        .title(format!(" {title} "))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
}

/// Horizontal fill bar, `pct` in 0..=100
pub fn fill_bar(pct: f64, width: usize) -> String {
    let pct = if pct.is_finite() { pct.clamp(0.0, 100.0) } else { 0.0 };
    let filled = ((pct / 100.0) * width as f64).round() as usize;
    format!(
        "{}{}",
        "█".repeat(filled.min(width)),
        "░".repeat(width.saturating_sub(filled))
    )
}

fn bar_width(area: Rect) -> usize {
    (area.width as usize).saturating_sub(26).clamp(10, 40)
}

/// Render the whole dashboard
pub fn render_dashboard(
    f: &mut Frame,
    area: Rect,
    state: &DashboardState,
    config: &DashboardConfig,
    now: DateTime<Utc>,
) {
    // Header | Account+Positions | Indicators+Signals | Performance+Risk | Trades+Log | Footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(9),
            Constraint::Length(12),
            Constraint::Length(8),
            Constraint::Min(8),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(f, chunks[0], state);

    let halves = |rect: Rect| {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rect)
    };

    let top = halves(chunks[1]);
    render_account(f, top[0], state);
    render_positions(f, top[1], state, now);

    let middle = halves(chunks[2]);
    render_indicators(f, middle[0], state);
    render_signals(f, middle[1], state.analysis.as_ref());

    let lower = halves(chunks[3]);
    render_performance(f, lower[0], state);
    render_risk(f, lower[1], state);

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[4]);
    render_trades(f, bottom[0], state);
    render_signal_log(f, bottom[1], state);

    render_footer(f, chunks[5], state, config, now);
}

fn render_header(f: &mut Frame, area: Rect, state: &DashboardState) {
    let block = panel("SCALPING DASHBOARD", C_HEADER);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut spans = Vec::new();
    match &state.status {
        Some(status) => {
            let color = if status.running { C_BUY } else { C_SELL };
            spans.push(Span::styled(
                format!("● {}", status.status_label()),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ));
            if let Some(mode) = &status.mode {
                spans.push(Span::raw("  "));
                spans.push(Span::styled(mode.to_uppercase(), Style::default().fg(C_NEUTRAL)));
            }
            spans.push(Span::raw("  BTC "));
            spans.push(Span::styled(
                status.btc_price.clone(),
                Style::default().fg(C_BRIGHT).add_modifier(Modifier::BOLD),
            ));
        }
        None => spans.push(Span::styled("○ CONNECTING", Style::default().fg(C_DIM))),
    }

    spans.push(Span::raw("  │  "));
    let last = state
        .last_update
        .map(|ts| ts.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--".to_string());
    spans.push(Span::styled(format!("Last update: {last}"), Style::default().fg(C_DIM)));
    spans.push(Span::raw("  "));
    spans.push(Span::styled(
        format!("Next in {}s", state.countdown.value()),
        Style::default().fg(C_ACCENT),
    ));
    if let Some(version) = state.server.as_ref().and_then(|s| s.version.as_deref()) {
        spans.push(Span::styled(format!("  v{version}"), Style::default().fg(C_DIM)));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), inner);
}

fn render_account(f: &mut Frame, area: Rect, state: &DashboardState) {
    let block = panel("ACCOUNT", C_ACCENT);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(status) = &state.status else {
        f.render_widget(Paragraph::new(dim("Waiting for api/status...")), inner);
        return;
    };

    let lines = vec![
        Line::from(vec![
            label("Balance"),
            Span::styled(status.balance.clone(), Style::default().fg(C_BRIGHT)),
            Span::raw("  "),
            cell(&status.balance_change),
        ]),
        Line::from(vec![
            label("Total PnL"),
            cell(&status.total_pnl),
            Span::raw("  "),
            cell(&status.pnl_percent),
        ]),
        Line::from(vec![label("Unrealized"), cell(&status.unrealized_pnl)]),
        Line::from(vec![
            label("Positions"),
            Span::styled(status.positions.clone(), Style::default().fg(C_BRIGHT)),
        ]),
    ];
    f.render_widget(Paragraph::new(lines), inner);
}

fn render_positions(f: &mut Frame, area: Rect, state: &DashboardState, now: DateTime<Utc>) {
    let block = panel("OPEN POSITIONS", C_ACCENT);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let cards = state.status.as_ref().map(|s| s.cards.as_slice()).unwrap_or_default();
    if cards.is_empty() {
        f.render_widget(Paragraph::new(dim("No open positions")), inner);
        return;
    }

    let mut lines = Vec::new();
    for card in cards {
        let mut header = vec![
            Span::styled(
                format!("{:<6}", card.side.as_str()),
                Style::default()
                    .fg(side_color(card.side))
                    .add_modifier(Modifier::BOLD),
            ),
            cell(&card.pnl),
        ];
        if let Some(age) = card.age(now) {
            header.push(Span::styled(format!("  ⏱ {age}"), Style::default().fg(C_DIM)));
        }
        lines.push(Line::from(header));
        lines.push(Line::from(vec![
            Span::styled("  Entry ", Style::default().fg(C_DIM)),
            Span::raw(card.entry.clone()),
            Span::styled("  Now ", Style::default().fg(C_DIM)),
            Span::raw(card.current.clone()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("  SL ", Style::default().fg(C_DIM)),
            Span::styled(card.stop_loss.clone(), Style::default().fg(C_SELL)),
            Span::styled("  TP ", Style::default().fg(C_DIM)),
            Span::styled(card.take_profit.clone(), Style::default().fg(C_BUY)),
        ]));
    }
    f.render_widget(Paragraph::new(lines), inner);
}

fn rsi_color(band: RsiBand) -> Color {
    match band {
        RsiBand::Overbought => C_SELL,
        RsiBand::Oversold => C_BUY,
        RsiBand::Neutral => C_ACCENT,
    }
}

fn render_indicators(f: &mut Frame, area: Rect, state: &DashboardState) {
    let block = panel("INDICATORS", C_ACCENT);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let (Some(base), Some(view)) = (&state.indicators, &state.analysis) else {
        f.render_widget(Paragraph::new(dim("Waiting for api/indicators...")), inner);
        return;
    };
    let width = bar_width(inner);
    let mut lines = Vec::new();

    for series in EmaSeries::ALL {
        let reading = view.emas[series as usize];
        let arrow = reading.trend.map(|t| t.arrow()).unwrap_or("→");
        let color = match arrow {
            "↑" => C_BUY,
            "↓" => C_SELL,
            _ => C_DIM,
        };
        lines.push(Line::from(vec![
            label(series.label()),
            Span::styled(format_fixed(reading.value, 2), Style::default().fg(C_BRIGHT)),
            Span::styled(format!(" {arrow}"), Style::default().fg(color)),
        ]));
    }

    let alignment = view.alignment.map(|a| a.label()).unwrap_or("--");
    lines.push(Line::from(vec![
        label("Alignment"),
        Span::styled(alignment.to_string(), Style::default().fg(C_NEUTRAL)),
        Span::styled("  Trend ", Style::default().fg(C_DIM)),
        Span::raw(view.trend_strength.map(|t| t.label()).unwrap_or("--")),
    ]));

    let rsi_fill = base.rsi_bar_pct.unwrap_or(view.rsi);
    lines.push(Line::from(vec![
        label("RSI"),
        cell(&base.rsi),
        Span::raw(" "),
        Span::styled(fill_bar(rsi_fill, width), Style::default().fg(rsi_color(view.rsi_band))),
        Span::styled(
            format!(" {}", view.rsi_band.label()),
            Style::default().fg(rsi_color(view.rsi_band)),
        ),
    ]));
    lines.push(Line::from(vec![
        label("Stoch K/D"),
        Span::raw(format!("{:.1} / {:.1}", view.stoch_k, view.stoch_d)),
    ]));

    let volume_color = match view.volume_activity {
        VolumeActivity::High => C_BUY,
        VolumeActivity::Normal => C_NEUTRAL,
        VolumeActivity::Low => C_DIM,
    };
    lines.push(Line::from(vec![
        label("Volume"),
        Span::raw(format!("{:.2}x ", view.volume_ratio)),
        Span::styled(fill_bar(view.volume_bar_pct, width), Style::default().fg(volume_color)),
        Span::styled(
            format!(" {}", view.volume_activity.label()),
            Style::default().fg(volume_color),
        ),
    ]));

    let volatility_color = |v: Volatility| match v {
        Volatility::Low => C_DIM,
        Volatility::Medium => C_NEUTRAL,
        Volatility::High => C_SELL,
    };
    lines.push(Line::from(vec![
        label("ATR"),
        Span::raw(format!("{:.2}% ", view.atr_pct)),
        Span::styled(
            fill_bar(view.volatility_meter_pct, width),
            Style::default().fg(volatility_color(view.volatility_meter)),
        ),
        Span::styled(
            format!(" {}", view.volatility_meter.label(VolatilityScale::Meter)),
            Style::default().fg(volatility_color(view.volatility_meter)),
        ),
    ]));
    lines.push(Line::from(vec![
        label("Volatility"),
        Span::raw(view.volatility_level.label(VolatilityScale::Conditions)),
        Span::styled("  Vol ", Style::default().fg(C_DIM)),
        Span::raw(base.volume.clone()),
    ]));

    f.render_widget(Paragraph::new(lines), inner);
}

fn signal_card_line(card: &SignalCard) -> Vec<Line<'static>> {
    let color = if card.active { side_color(card.side) } else { C_DIM };
    vec![
        Line::from(vec![
            Span::styled(
                format!("{:<6}", card.side.as_str()),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(card.confidence.clone(), Style::default().fg(color)),
        ]),
        Line::from(Span::styled(
            format!("  {}", card.conditions),
            Style::default().fg(C_DIM),
        )),
    ]
}

fn render_signals(f: &mut Frame, area: Rect, view: Option<&IndicatorView>) {
    let block = panel("MARKET & SIGNALS", C_ACCENT);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(view) = view else {
        f.render_widget(Paragraph::new(dim("ANALYZING")), inner);
        return;
    };

    let regime_color = match view.regime {
        MarketRegime::Trending => C_BUY,
        MarketRegime::Ranging => C_NEUTRAL,
        MarketRegime::Choppy => C_SELL,
        MarketRegime::Analyzing => C_DIM,
    };
    let mut lines = vec![Line::from(vec![
        label("Market"),
        Span::styled(
            view.regime.label(),
            Style::default().fg(regime_color).add_modifier(Modifier::BOLD),
        ),
    ])];

    match &view.signals {
        Some(cards) => {
            let strength_color = match cards.strength {
                SignalStrength::Strong => C_BUY,
                SignalStrength::Moderate => C_NEUTRAL,
                SignalStrength::Weak => C_DIM,
            };
            lines.push(Line::from(vec![
                label("Strength"),
                Span::styled(cards.strength.label(), Style::default().fg(strength_color)),
            ]));
            lines.extend(signal_card_line(&cards.long));
            lines.extend(signal_card_line(&cards.short));
        }
        None => lines.push(dim("No signal candidates yet")),
    }

    f.render_widget(Paragraph::new(lines), inner);
}

fn render_performance(f: &mut Frame, area: Rect, state: &DashboardState) {
    let block = panel("PERFORMANCE", C_ACCENT);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(perf) = &state.performance else {
        f.render_widget(Paragraph::new(dim("Waiting for api/performance...")), inner);
        return;
    };

    let lines = vec![
        Line::from(vec![label("Trades"), Span::raw(perf.total_trades.clone())]),
        Line::from(vec![
            label("Win rate"),
            cell(&perf.win_rate),
            Span::styled(format!("  ({})", perf.wins_losses), Style::default().fg(C_DIM)),
        ]),
        Line::from(vec![label("Profit factor"), Span::raw(perf.profit_factor.clone())]),
        Line::from(vec![label("Avg PnL"), cell(&perf.avg_pnl)]),
        Line::from(vec![label("Best trade"), cell(&perf.best_trade)]),
    ];
    f.render_widget(Paragraph::new(lines), inner);
}

fn progress_line(name: &str, bar: &ProgressBar, width: usize) -> Line<'static> {
    let color = match bar.level {
        BarLevel::Danger => C_SELL,
        BarLevel::Warning => C_NEUTRAL,
        BarLevel::Normal => C_ACCENT,
    };
    Line::from(vec![
        label(name),
        Span::styled(fill_bar(bar.width(), width), Style::default().fg(color)),
        Span::styled(format!(" {:.0}%", bar.width()), Style::default().fg(color)),
    ])
}

fn render_risk(f: &mut Frame, area: Rect, state: &DashboardState) {
    let Some(risk) = &state.risk else {
        let block = panel("RISK", C_ACCENT);
        let inner = block.inner(area);
        f.render_widget(block, area);
        f.render_widget(Paragraph::new(dim("Waiting for api/risk...")), inner);
        return;
    };

    let border = if risk.circuit_breaker { C_SELL } else { C_ACCENT };
    let block = panel("RISK", border);
    let inner = block.inner(area);
    f.render_widget(block, area);
    let width = bar_width(inner);

    let lines = vec![
        Line::from(vec![label("Daily PnL"), cell(&risk.daily_pnl)]),
        progress_line("Daily limit", &risk.daily_bar, width),
        Line::from(vec![label("Max drawdown"), Span::raw(risk.max_drawdown.clone())]),
        progress_line("Drawdown", &risk.drawdown_bar, width),
        Line::from(vec![
            label("Streak"),
            Span::raw(risk.consecutive.clone()),
            Span::styled("  Breaker ", Style::default().fg(C_DIM)),
            Span::styled(
                risk.circuit_label(),
                Style::default()
                    .fg(if risk.circuit_breaker { C_SELL } else { C_BUY })
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
    ];
    f.render_widget(Paragraph::new(lines), inner);
}

fn render_trades(f: &mut Frame, area: Rect, state: &DashboardState) {
    let mode = state.trade_mode.map(|m| m.as_str()).unwrap_or("all");
    let block = panel(&format!("RECENT TRADES [{mode}]"), C_ACCENT);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(trades) = &state.trades else {
        f.render_widget(Paragraph::new(dim("Waiting for api/trades...")), inner);
        return;
    };

    let now = Local::now();
    let lines: Vec<Line> = match &trades.body {
        TradesBody::Empty(message) => vec![dim(message.clone())],
        TradesBody::Rows(rows) => rows
            .iter()
            .flat_map(|row| {
                let mode_color = match row.mode {
                    TradingMode::Live => C_SELL,
                    TradingMode::Paper => C_DIM,
                };
                [
                    Line::from(vec![
                        Span::styled(
                            format!("{:<6}", row.side.as_str()),
                            Style::default().fg(side_color(row.side)),
                        ),
                        Span::styled(
                            format!("{:<6}", row.mode.as_str().to_uppercase()),
                            Style::default().fg(mode_color),
                        ),
                        cell(&row.pnl),
                        Span::raw(" "),
                        cell(&row.pnl_percent),
                    ]),
                    Line::from(Span::styled(
                        format!(
                            "  {}  {}  {}  {}",
                            row.prices,
                            row.exit_reason,
                            row.hold,
                            format_timestamp(row.closed_at, &now)
                        ),
                        Style::default().fg(C_DIM),
                    )),
                ]
            })
            .collect(),
    };
    f.render_widget(Paragraph::new(lines), inner);
}

fn render_signal_log(f: &mut Frame, area: Rect, state: &DashboardState) {
    let log = &state.signal_log;
    let stats = log.stats_view();
    let block = panel(
        &format!(
            "SIGNALS {}h [{}]  {} total · {} exec · {} rej · {}",
            log.hours(),
            log.filter(),
            stats.total,
            stats.executed,
            stats.rejected,
            stats.execution_rate
        ),
        C_ACCENT,
    );
    let inner = block.inner(area);
    f.render_widget(block, area);

    let lines: Vec<Line> = match log.body() {
        SignalBody::Placeholder(text) => vec![dim(text)],
        SignalBody::Rows(rows) => rows
            .into_iter()
            .map(|row| {
                let status_color = if row.executed { C_BUY } else { C_SELL };
                Line::from(vec![
                    Span::styled(format!("{} ", row.time), Style::default().fg(C_DIM)),
                    Span::styled(
                        format!("{:<6}", row.side.as_str()),
                        Style::default().fg(side_color(row.side)),
                    ),
                    Span::raw(format!("{:>5} ", row.confidence)),
                    Span::raw(format!("{} ", row.entry)),
                    Span::styled(format!("{} ", row.stop), Style::default().fg(C_SELL)),
                    Span::styled(format!("{} ", row.target), Style::default().fg(C_BUY)),
                    Span::styled(format!("{} ", row.status), Style::default().fg(status_color)),
                    Span::styled(
                        format!("{} · {}", row.rejection, row.conditions),
                        Style::default().fg(C_DIM),
                    ),
                ])
            })
            .collect(),
    };
    f.render_widget(Paragraph::new(lines), inner);
}

fn render_footer(
    f: &mut Frame,
    area: Rect,
    state: &DashboardState,
    config: &DashboardConfig,
    now: DateTime<Utc>,
) {
    let mut spans = vec![
        Span::styled(" [m]", Style::default().fg(Color::Yellow)),
        Span::raw("ode  "),
        Span::styled("[f]", Style::default().fg(Color::Yellow)),
        Span::raw("ilter  "),
        Span::styled("[h]", Style::default().fg(Color::Yellow)),
        Span::raw("ours  "),
        Span::styled("[r]", Style::default().fg(Color::Yellow)),
        Span::raw("efresh  "),
        Span::styled("[q]", Style::default().fg(Color::Yellow)),
        Span::raw(" Quit"),
    ];

    for (feed, since) in state.stale_feeds(config, now) {
        spans.push(Span::raw("  │  "));
        spans.push(Span::styled(
            format!("{feed} stale since {}", format_clock(since, &Local)),
            Style::default().fg(C_SELL),
        ));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
