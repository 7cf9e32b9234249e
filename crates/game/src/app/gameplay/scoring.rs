#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct ScoreInputs {
    pub(crate) elapsed_seconds: f64,
    pub(crate) deaths: u32,
    pub(crate) coins_collected: u32,
    pub(crate) total_coins: u32,
}

fn coin_score(coins_collected: u32, total_coins: u32) -> f64 {
    if total_coins == 0 {
        return 0.0;
    }
    f64::from(coins_collected) / f64::from(total_coins) * COIN_SCORE_WEIGHT
}

fn death_penalty(deaths: u32) -> f64 {
    (f64::from(deaths) * DEATH_PENALTY_PER_DEATH).min(DEATH_PENALTY_CAP)
}

fn time_penalty(elapsed_seconds: f64) -> f64 {
    if elapsed_seconds <= TIME_GRACE_SECONDS {
        0.0
    } else if elapsed_seconds <= TIME_SOFT_LIMIT_SECONDS {
        ((elapsed_seconds - TIME_GRACE_SECONDS) * TIME_SOFT_PENALTY_RATE).min(TIME_SOFT_PENALTY_CAP)
    } else {
        TIME_HARD_PENALTY_BASE + (elapsed_seconds - TIME_SOFT_LIMIT_SECONDS) * TIME_HARD_PENALTY_RATE
    }
}

/// Final run score in `[0, 999]`. A perfect, fast, deathless run with every
/// coin scores exactly 999.
fn score_run(inputs: &ScoreInputs) -> u32 {
    let raw = SCORE_BASE + coin_score(inputs.coins_collected, inputs.total_coins)
        - death_penalty(inputs.deaths)
        - time_penalty(inputs.elapsed_seconds.max(0.0))
        - COIN_SCORE_WEIGHT;
    raw.round().clamp(0.0, f64::from(SCORE_MAX)) as u32
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ScoreReport {
    pub(crate) score: u32,
    pub(crate) inputs: ScoreInputs,
    pub(crate) lines: Vec<String>,
}

impl ScoreReport {
    fn from_inputs(inputs: ScoreInputs) -> Self {
        let score = score_run(&inputs);
        let lines = vec![
            format!("Score: {score}"),
            format!("Time: {}", format_mm_ss(inputs.elapsed_seconds)),
            format!("Deaths: {}", inputs.deaths),
            format!("Coins: {}/{}", inputs.coins_collected, inputs.total_coins),
        ];
        Self {
            score,
            inputs,
            lines,
        }
    }
}
