//! Indicator classification: turns raw indicator values into discrete display states.
//!
//! Everything here is pure except [`EmaHistory`], which remembers the previous EMA values
//! so the next update can draw trend arrows.

use crate::shared::types::{IndicatorSet, Side, SignalDetail};

// ============================================================================
// Thresholds
// ============================================================================

pub const RSI_OVERBOUGHT: f64 = 70.0;
pub const RSI_OVERSOLD: f64 = 30.0;
pub const VOLUME_HIGH: f64 = 1.5;
pub const VOLUME_NORMAL: f64 = 0.8;
pub const TREND_STRONG_SPREAD_PCT: f64 = 0.2;
pub const TREND_MODERATE_SPREAD_PCT: f64 = 0.1;
pub const SIGNAL_STRONG: f64 = 0.7;
pub const SIGNAL_MODERATE: f64 = 0.5;
/// A long/short candidate is shown as active only above this confidence
pub const SIGNAL_ACTIVE: f64 = 0.6;
pub const WIN_RATE_GOOD: f64 = 50.0;

/// Styling tone derived from a value
#[derive(Clone, Debug, Copy, PartialEq, Eq, Default)]
pub enum Tone {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Tone {
    /// `v > 0` positive, `v < 0` negative, otherwise neutral
    pub fn of(value: Option<f64>) -> Self {
        match value {
            Some(v) if v > 0.0 => Tone::Positive,
            Some(v) if v < 0.0 => Tone::Negative,
            _ => Tone::Neutral,
        }
    }

    pub fn win_rate(win_rate: Option<f64>) -> Self {
        match win_rate {
            Some(rate) if rate >= WIN_RATE_GOOD => Tone::Positive,
            Some(_) => Tone::Negative,
            None => Tone::Neutral,
        }
    }

    /// Inside the neutral RSI band is healthy, outside is stretched
    pub fn rsi(rsi: Option<f64>) -> Self {
        match rsi {
            Some(r) if r > RSI_OVERSOLD && r < RSI_OVERBOUGHT => Tone::Positive,
            Some(_) => Tone::Negative,
            None => Tone::Neutral,
        }
    }
}

/// RSI band
#[derive(Clone, Debug, Copy, PartialEq, Eq, Default)]
pub enum RsiBand {
    Overbought,
    Oversold,
    #[default]
    Neutral,
}

impl RsiBand {
    pub fn classify(rsi: f64) -> Self {
        if rsi > RSI_OVERBOUGHT {
            RsiBand::Overbought
        } else if rsi < RSI_OVERSOLD {
            RsiBand::Oversold
        } else {
            RsiBand::Neutral
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RsiBand::Overbought => "OVERBOUGHT",
            RsiBand::Oversold => "OVERSOLD",
            RsiBand::Neutral => "NEUTRAL",
        }
    }
}

/// Direction of an EMA series since the previous update
#[derive(Clone, Debug, Copy, PartialEq, Eq, Default)]
pub enum TrendArrow {
    Up,
    Down,
    #[default]
    Flat,
}

impl TrendArrow {
    pub fn between(previous: Option<f64>, current: f64) -> Self {
        match previous {
            Some(prev) if current > prev => TrendArrow::Up,
            Some(prev) if current < prev => TrendArrow::Down,
            _ => TrendArrow::Flat,
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            TrendArrow::Up => "↑",
            TrendArrow::Down => "↓",
            TrendArrow::Flat => "→",
        }
    }
}

/// Ordering of the micro/fast/slow EMAs
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum EmaAlignment {
    Bullish,
    Bearish,
    Mixed,
}

impl EmaAlignment {
    /// `None` unless all three values are present and non-zero
    pub fn classify(micro: Option<f64>, fast: Option<f64>, slow: Option<f64>) -> Option<Self> {
        let (micro, fast, slow) = (present(micro)?, present(fast)?, present(slow)?);
        Some(if micro > fast && fast > slow {
            EmaAlignment::Bullish
        } else if micro < fast && fast < slow {
            EmaAlignment::Bearish
        } else {
            EmaAlignment::Mixed
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            EmaAlignment::Bullish => "Bullish",
            EmaAlignment::Bearish => "Bearish",
            EmaAlignment::Mixed => "Mixed",
        }
    }
}

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum VolumeActivity {
    High,
    Normal,
    Low,
}

impl VolumeActivity {
    pub fn classify(ratio: f64) -> Self {
        if ratio > VOLUME_HIGH {
            VolumeActivity::High
        } else if ratio > VOLUME_NORMAL {
            VolumeActivity::Normal
        } else {
            VolumeActivity::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VolumeActivity::High => "High",
            VolumeActivity::Normal => "Normal",
            VolumeActivity::Low => "Low",
        }
    }
}

/// Threshold scale for the ATR% volatility bucket.
///
/// The meter and the market-conditions row share one bucket rule but each keeps its own
/// upper threshold.
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum VolatilityScale {
    /// 1.0 / 2.0
    Meter,
    /// 1.0 / 2.5
    Conditions,
}

impl VolatilityScale {
    pub fn thresholds(&self) -> (f64, f64) {
        match self {
            VolatilityScale::Meter => (1.0, 2.0),
            VolatilityScale::Conditions => (1.0, 2.5),
        }
    }
}

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum Volatility {
    Low,
    Medium,
    High,
}

impl Volatility {
    pub fn classify(atr_pct: f64, scale: VolatilityScale) -> Self {
        let (low, high) = scale.thresholds();
        if atr_pct < low {
            Volatility::Low
        } else if atr_pct < high {
            Volatility::Medium
        } else {
            Volatility::High
        }
    }

    pub fn label(&self, scale: VolatilityScale) -> &'static str {
        match (scale, self) {
            (VolatilityScale::Meter, Volatility::Low) => "LOW",
            (VolatilityScale::Meter, Volatility::Medium) => "MEDIUM",
            (VolatilityScale::Meter, Volatility::High) => "HIGH",
            (VolatilityScale::Conditions, Volatility::Low) => "Low",
            (VolatilityScale::Conditions, Volatility::Medium) => "Normal",
            (VolatilityScale::Conditions, Volatility::High) => "High",
        }
    }
}

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum TrendStrength {
    Strong,
    Moderate,
    Weak,
}

impl TrendStrength {
    /// From the normalised micro/slow spread `|(micro - slow) / slow| * 100`
    pub fn from_emas(micro: Option<f64>, slow: Option<f64>) -> Option<Self> {
        let (micro, slow) = (micro?, present(slow)?);
        let spread = ((micro - slow) / slow).abs() * 100.0;
        Some(if spread > TREND_STRONG_SPREAD_PCT {
            TrendStrength::Strong
        } else if spread > TREND_MODERATE_SPREAD_PCT {
            TrendStrength::Moderate
        } else {
            TrendStrength::Weak
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrendStrength::Strong => "Strong",
            TrendStrength::Moderate => "Moderate",
            TrendStrength::Weak => "Weak",
        }
    }
}

#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum SignalStrength {
    Strong,
    Moderate,
    Weak,
}

impl SignalStrength {
    /// From the greater of the long/short confidences (0..1)
    pub fn classify(long: Option<&SignalDetail>, short: Option<&SignalDetail>) -> Self {
        let confidence = |detail: Option<&SignalDetail>| {
            detail.and_then(|d| d.confidence).unwrap_or(0.0)
        };
        let max = confidence(long).max(confidence(short));
        if max > SIGNAL_STRONG {
            SignalStrength::Strong
        } else if max > SIGNAL_MODERATE {
            SignalStrength::Moderate
        } else {
            SignalStrength::Weak
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SignalStrength::Strong => "STRONG",
            SignalStrength::Moderate => "MODERATE",
            SignalStrength::Weak => "WEAK",
        }
    }
}

/// Qualitative market state
#[derive(Clone, Debug, Copy, PartialEq, Eq, Default)]
pub enum MarketRegime {
    Trending,
    Ranging,
    Choppy,
    #[default]
    Analyzing,
}

impl MarketRegime {
    /// Server regime tag wins; otherwise LONG/SHORT means trending and any other signal
    /// ranging; with neither the engine is still analysing.
    pub fn resolve(regime_tag: Option<&str>, signal: Option<&str>) -> Self {
        let tagged = regime_tag.and_then(|tag| match tag.trim().to_lowercase().as_str() {
            "trending" => Some(MarketRegime::Trending),
            "ranging" => Some(MarketRegime::Ranging),
            "choppy" => Some(MarketRegime::Choppy),
            _ => None,
        });
        if let Some(regime) = tagged {
            return regime;
        }

        match signal.map(|s| s.trim().to_uppercase()) {
            Some(s) if s == "LONG" || s == "SHORT" => MarketRegime::Trending,
            Some(s) if !s.is_empty() => MarketRegime::Ranging,
            _ => MarketRegime::Analyzing,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MarketRegime::Trending => "TRENDING",
            MarketRegime::Ranging => "RANGING",
            MarketRegime::Choppy => "CHOPPY",
            MarketRegime::Analyzing => "ANALYZING",
        }
    }
}

// ============================================================================
// EMA history
// ============================================================================

/// EMA series tracked for trend arrows
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub enum EmaSeries {
    Micro,
    Fast,
    Slow,
}

impl EmaSeries {
    pub const ALL: [EmaSeries; 3] = [EmaSeries::Micro, EmaSeries::Fast, EmaSeries::Slow];

    pub fn label(&self) -> &'static str {
        match self {
            EmaSeries::Micro => "EMA 5",
            EmaSeries::Fast => "EMA 8",
            EmaSeries::Slow => "EMA 21",
        }
    }

    fn value(&self, set: &IndicatorSet) -> Option<f64> {
        match self {
            EmaSeries::Micro => set.ema_micro,
            EmaSeries::Fast => set.ema_fast,
            EmaSeries::Slow => set.ema_slow,
        }
    }
}

/// One EMA series as displayed: value plus arrow, `None` keeps the previous render
#[derive(Clone, Debug, Copy, PartialEq, Default)]
pub struct EmaReading {
    pub value: Option<f64>,
    pub trend: Option<TrendArrow>,
}

/// Last-seen EMA values, overwritten once per update
#[derive(Clone, Debug, Default)]
pub struct EmaHistory {
    previous: [Option<f64>; 3],
}

impl EmaHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous(&self, series: EmaSeries) -> Option<f64> {
        self.previous[series as usize]
    }

    /// Compute the arrows for every present series and record the new values.
    ///
    /// Series missing from `set` are left untouched in both the history and the output.
    pub fn advance(&mut self, set: &IndicatorSet) -> [EmaReading; 3] {
        let mut readings = [EmaReading::default(); 3];
        for series in EmaSeries::ALL {
            let idx = series as usize;
            if let Some(current) = present(series.value(set)) {
                readings[idx] = EmaReading {
                    value: Some(current),
                    trend: Some(TrendArrow::between(self.previous[idx], current)),
                };
                self.previous[idx] = Some(current);
            }
        }
        readings
    }
}

// ============================================================================
// Classifier
// ============================================================================

/// Long or short candidate card
#[derive(Clone, Debug, PartialEq)]
pub struct SignalCard {
    pub side: Side,
    pub active: bool,
    pub confidence: String,
    pub conditions: String,
}

impl SignalCard {
    pub fn new(side: Side, detail: Option<&SignalDetail>) -> Self {
        match detail {
            Some(detail) if detail.confidence.is_some_and(|c| c > SIGNAL_ACTIVE) => {
                let confidence = detail.confidence.unwrap_or_default();
                let conditions = if detail.conditions.is_empty() {
                    "Conditions met".to_string()
                } else {
                    detail
                        .conditions
                        .iter()
                        .take(3)
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                Self {
                    side,
                    active: true,
                    confidence: format!("{:.1}%", confidence * 100.0),
                    conditions,
                }
            }
            _ => Self {
                side,
                active: false,
                confidence: "--%".to_string(),
                conditions: "No signal".to_string(),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SignalCards {
    pub long: SignalCard,
    pub short: SignalCard,
    pub strength: SignalStrength,
}

/// Qualitative view of one indicators payload
#[derive(Clone, Debug, PartialEq)]
pub struct IndicatorView {
    pub rsi: f64,
    pub rsi_band: RsiBand,
    pub stoch_k: f64,
    pub stoch_d: f64,
    pub emas: [EmaReading; 3],
    /// `None` when the triple is incomplete
    pub alignment: Option<EmaAlignment>,
    pub volume_ratio: f64,
    /// Bar fill, 2.0x volume = 100%
    pub volume_bar_pct: f64,
    pub volume_activity: VolumeActivity,
    pub atr_pct: f64,
    /// Meter fill, 3% ATR = 100%
    pub volatility_meter_pct: f64,
    pub volatility_meter: Volatility,
    pub volatility_level: Volatility,
    pub trend_strength: Option<TrendStrength>,
    /// `None` when the payload carried neither candidate
    pub signals: Option<SignalCards>,
    pub regime: MarketRegime,
}

impl IndicatorView {
    /// Carry over the parts this payload did not supply: EMA readings for missing series,
    /// the alignment label and the signal cards.
    pub fn retain_from(mut self, previous: &IndicatorView) -> Self {
        for (reading, prior) in self.emas.iter_mut().zip(previous.emas.iter()) {
            if reading.value.is_none() {
                *reading = *prior;
            }
        }
        if self.alignment.is_none() {
            self.alignment = previous.alignment;
        }
        if self.signals.is_none() {
            self.signals = previous.signals.clone();
        }
        self
    }
}

/// Owns the EMA history; everything else is derived per call.
#[derive(Clone, Debug, Default)]
pub struct IndicatorClassifier {
    history: EmaHistory,
}

impl IndicatorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &EmaHistory {
        &self.history
    }

    /// Classify one payload. Advances the EMA history exactly once.
    pub fn classify(&mut self, set: &IndicatorSet) -> IndicatorView {
        let rsi = present(set.rsi).unwrap_or(50.0);
        let volume_ratio = present(set.volume_ratio).unwrap_or(1.0);
        let atr_pct = set.atr_pct.unwrap_or(0.0);

        let signals = (set.long.is_some() || set.short.is_some()).then(|| SignalCards {
            long: SignalCard::new(Side::Long, set.long.as_ref()),
            short: SignalCard::new(Side::Short, set.short.as_ref()),
            strength: SignalStrength::classify(set.long.as_ref(), set.short.as_ref()),
        });

        IndicatorView {
            rsi,
            rsi_band: RsiBand::classify(rsi),
            stoch_k: set.stoch_k.unwrap_or(0.0),
            stoch_d: set.stoch_d.unwrap_or(0.0),
            emas: self.history.advance(set),
            alignment: EmaAlignment::classify(set.ema_micro, set.ema_fast, set.ema_slow),
            volume_ratio,
            volume_bar_pct: (volume_ratio / 2.0 * 100.0).min(100.0),
            volume_activity: VolumeActivity::classify(volume_ratio),
            atr_pct,
            volatility_meter_pct: (atr_pct / 3.0 * 100.0).clamp(0.0, 100.0),
            volatility_meter: Volatility::classify(atr_pct, VolatilityScale::Meter),
            volatility_level: Volatility::classify(atr_pct, VolatilityScale::Conditions),
            trend_strength: TrendStrength::from_emas(set.ema_micro, set.ema_slow),
            signals,
            regime: MarketRegime::resolve(set.market_regime.as_deref(), set.signal.as_deref()),
        }
    }
}

/// Zero counts as missing, matching how the server fills unset indicators
fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != 0.0)
}
