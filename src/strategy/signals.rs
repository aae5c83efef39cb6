use crate::models::Direction;

/// Multiplier applied when RSI and EMA agree on direction
const AGREEMENT_BONUS: f64 = 1.2;
/// Multiplier applied when only one sub-signal (or the stronger of two opposing ones) is used
const DISAGREEMENT_PENALTY: f64 = 0.8;
/// RSI points beyond a threshold that count as full strength
const RSI_STRENGTH_SCALE: f64 = 10.0;
/// Relative EMA spread scale: a 10% spread is full strength
const EMA_STRENGTH_SCALE: f64 = 10.0;

/// RSI thresholds for signal generation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalThresholds {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
        }
    }
}

/// Direction and confidence produced by [`evaluate`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub direction: Direction,
    pub strength: f64,
}

impl Evaluation {
    const NEUTRAL: Evaluation = Evaluation {
        direction: Direction::Neutral,
        strength: 0.0,
    };
}

/// RSI sub-signal: oversold buys, overbought sells
pub fn rsi_signal(rsi: f64, thresholds: &SignalThresholds) -> Evaluation {
    if !rsi.is_finite() {
        return Evaluation::NEUTRAL;
    }

    if rsi < thresholds.rsi_oversold {
        Evaluation {
            direction: Direction::Buy,
            strength: ((thresholds.rsi_oversold - rsi) / RSI_STRENGTH_SCALE).min(1.0),
        }
    } else if rsi > thresholds.rsi_overbought {
        Evaluation {
            direction: Direction::Sell,
            strength: ((rsi - thresholds.rsi_overbought) / RSI_STRENGTH_SCALE).min(1.0),
        }
    } else {
        Evaluation::NEUTRAL
    }
}

/// EMA crossover sub-signal: fast above slow buys, fast below slow sells
///
/// A zero (or non-finite) slow EMA yields a neutral sub-signal.
pub fn ema_signal(ema_fast: f64, ema_slow: f64) -> Evaluation {
    if !ema_fast.is_finite() || !ema_slow.is_finite() || ema_slow == 0.0 {
        return Evaluation::NEUTRAL;
    }

    let spread = (ema_fast - ema_slow) / ema_slow * EMA_STRENGTH_SCALE;

    if ema_fast > ema_slow {
        Evaluation {
            direction: Direction::Buy,
            strength: spread.abs().min(1.0),
        }
    } else if ema_fast < ema_slow {
        Evaluation {
            direction: Direction::Sell,
            strength: spread.abs().min(1.0),
        }
    } else {
        Evaluation::NEUTRAL
    }
}

/// Combine RSI and EMA crossover readings into a single directional decision
///
/// - Both agree: average strength with a 1.2x bonus, capped at 1.0
/// - Otherwise: the stronger directional sub-signal (ties go to RSI) at 0.8x
/// - Neither directional: neutral with zero strength
///
/// Pure and deterministic.
pub fn evaluate(
    rsi: f64,
    ema_fast: f64,
    ema_slow: f64,
    thresholds: &SignalThresholds,
) -> Evaluation {
    let rsi = rsi_signal(rsi, thresholds);
    let ema = ema_signal(ema_fast, ema_slow);

    let combined = match (rsi.direction, ema.direction) {
        (Direction::Neutral, Direction::Neutral) => Evaluation::NEUTRAL,
        (a, b) if a == b => Evaluation {
            direction: a,
            strength: ((rsi.strength + ema.strength) / 2.0 * AGREEMENT_BONUS).min(1.0),
        },
        (Direction::Neutral, _) => penalized(ema),
        (_, Direction::Neutral) => penalized(rsi),
        _ if rsi.strength >= ema.strength => penalized(rsi),
        _ => penalized(ema),
    };

    Evaluation {
        direction: combined.direction,
        strength: combined.strength.clamp(0.0, 1.0),
    }
}

fn penalized(evaluation: Evaluation) -> Evaluation {
    Evaluation {
        direction: evaluation.direction,
        strength: evaluation.strength * DISAGREEMENT_PENALTY,
    }
}
