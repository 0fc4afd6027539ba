//! Retirement corpus projection
//!
//! Deterministic and replayable: the same balance/age/tenure inputs always
//! reproduce bit-identical outputs. All arithmetic stays in `Decimal`;
//! rounding happens only at the display boundary via
//! [`ProjectionOutcome::rounded`].

use crate::config::PolicyConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const DAYS_PER_YEAR: u32 = 365;

/// Inputs derived from a user's profile and entry log
#[derive(Debug, Clone)]
pub struct ProjectionInput {
    /// Current net balance
    pub balance: Decimal,
    /// Age in years; `None` falls back to the policy default
    pub age: Option<u32>,
    /// Days since account creation (tenure)
    pub account_age_days: i64,
    /// Whether the user has at least one contribution entry
    pub has_contributions: bool,
}

/// A named growth scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Display name
    pub name: String,
    /// Annual growth rate as a fraction (0.08 = 8%)
    pub annual_rate: Decimal,
}

impl Scenario {
    /// Convenience constructor
    pub fn new(name: &str, annual_rate: Decimal) -> Self {
        Self {
            name: name.to_string(),
            annual_rate,
        }
    }
}

/// The product's standard three-scenario view
pub fn default_scenarios() -> Vec<Scenario> {
    vec![
        Scenario::new("conservative", Decimal::new(6, 2)),
        Scenario::new("balanced", Decimal::new(8, 2)),
        Scenario::new("aggressive", Decimal::new(12, 2)),
    ]
}

/// Projected outcome for one scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionOutcome {
    /// Scenario name
    pub scenario: String,
    /// Annual growth rate used
    pub annual_rate: Decimal,
    /// Years until the retirement age
    pub years_to_retirement: u32,
    /// Assumed annual contribution (avg daily x 365)
    pub annual_contribution: Decimal,
    /// Projected corpus at retirement
    pub corpus: Decimal,
    /// Corpus spread over the fixed annuity window
    pub monthly_pension: Decimal,
}

impl ProjectionOutcome {
    /// Display-boundary rounding to 2 decimals; the projection itself is
    /// computed at full precision
    pub fn rounded(mut self) -> Self {
        self.annual_contribution = self.annual_contribution.round_dp(2);
        self.corpus = self.corpus.round_dp(2);
        self.monthly_pension = self.monthly_pension.round_dp(2);
        self
    }
}

/// Average daily contribution estimate for a user
///
/// `balance / max(1, tenure_days)` when the user has contribution history,
/// otherwise the policy's fixed default rate.
pub fn average_daily_contribution(input: &ProjectionInput, policy: &PolicyConfig) -> Decimal {
    if input.has_contributions {
        let days = input.account_age_days.max(1);
        input.balance / Decimal::from(days)
    } else {
        policy.default_daily_contribution
    }
}

/// Project the retirement corpus under each scenario
///
/// Compounds annually: `corpus_{i+1} = (corpus_i + annual) * (1 + rate)`,
/// starting from the current balance, for `max(retirement_age - age, 0)`
/// years. With zero years to retirement the corpus equals the balance and
/// the monthly pension is `balance / annuity_months`.
pub fn project(
    input: &ProjectionInput,
    scenarios: &[Scenario],
    policy: &PolicyConfig,
) -> Vec<ProjectionOutcome> {
    let age = input.age.unwrap_or(policy.default_age);
    let years_to_retirement = policy.retirement_age.saturating_sub(age);

    let avg_daily = average_daily_contribution(input, policy);
    let annual_contribution = avg_daily * Decimal::from(DAYS_PER_YEAR);
    let annuity_months = Decimal::from(policy.annuity_months);

    scenarios
        .iter()
        .map(|scenario| {
            let growth = Decimal::ONE + scenario.annual_rate;
            let mut corpus = input.balance;
            for _ in 0..years_to_retirement {
                corpus = (corpus + annual_contribution) * growth;
            }

            ProjectionOutcome {
                scenario: scenario.name.clone(),
                annual_rate: scenario.annual_rate,
                years_to_retirement,
                annual_contribution,
                corpus,
                monthly_pension: corpus / annuity_months,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PolicyConfig {
        PolicyConfig::default()
    }

    #[test]
    fn test_closed_form_two_years() {
        // Age 58, balance 1000, avg daily 10 => annual 3650, rate 8%
        let input = ProjectionInput {
            balance: Decimal::from(1000),
            age: Some(58),
            account_age_days: 100, // 1000 / 100 = avg daily 10
            has_contributions: true,
        };
        let scenarios = [Scenario::new("test", Decimal::new(8, 2))];

        let outcome = &project(&input, &scenarios, &policy())[0];
        assert_eq!(outcome.years_to_retirement, 2);
        assert_eq!(outcome.annual_contribution, Decimal::from(3650));

        let rate = Decimal::new(108, 2);
        let corpus_1 = (Decimal::from(1000) + Decimal::from(3650)) * rate;
        let corpus_2 = (corpus_1 + Decimal::from(3650)) * rate;
        assert_eq!(outcome.corpus, corpus_2);
        assert_eq!(outcome.monthly_pension, corpus_2 / Decimal::from(180));
    }

    #[test]
    fn test_determinism() {
        let input = ProjectionInput {
            balance: Decimal::new(123456, 2),
            age: Some(41),
            account_age_days: 733,
            has_contributions: true,
        };
        let scenarios = default_scenarios();
        let a = project(&input, &scenarios, &policy());
        let b = project(&input, &scenarios, &policy());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.corpus, y.corpus);
            assert_eq!(x.monthly_pension, y.monthly_pension);
        }
    }

    #[test]
    fn test_missing_age_defaults_to_thirty() {
        let input = ProjectionInput {
            balance: Decimal::from(100),
            age: None,
            account_age_days: 10,
            has_contributions: true,
        };
        let scenarios = [Scenario::new("test", Decimal::new(8, 2))];
        let outcome = &project(&input, &scenarios, &policy())[0];
        assert_eq!(outcome.years_to_retirement, 30);
    }

    #[test]
    fn test_no_history_uses_default_rate() {
        let input = ProjectionInput {
            balance: Decimal::ZERO,
            age: Some(30),
            account_age_days: 0,
            has_contributions: false,
        };
        assert_eq!(
            average_daily_contribution(&input, &policy()),
            Decimal::from(15)
        );
    }

    #[test]
    fn test_past_retirement_age_projects_current_balance() {
        let input = ProjectionInput {
            balance: Decimal::from(900),
            age: Some(65),
            account_age_days: 2000,
            has_contributions: true,
        };
        let scenarios = [Scenario::new("test", Decimal::new(8, 2))];
        let outcome = &project(&input, &scenarios, &policy())[0];
        assert_eq!(outcome.years_to_retirement, 0);
        assert_eq!(outcome.corpus, Decimal::from(900));
        assert_eq!(outcome.monthly_pension, Decimal::from(5)); // 900 / 180
    }

    #[test]
    fn test_tenure_floor_of_one_day() {
        let input = ProjectionInput {
            balance: Decimal::from(50),
            age: Some(30),
            account_age_days: 0,
            has_contributions: true,
        };
        assert_eq!(
            average_daily_contribution(&input, &policy()),
            Decimal::from(50)
        );
    }

    #[test]
    fn test_rounding_only_at_display_boundary() {
        let input = ProjectionInput {
            balance: Decimal::new(100001, 2), // 1000.01
            age: Some(57),
            account_age_days: 3,
            has_contributions: true,
        };
        let scenarios = [Scenario::new("test", Decimal::new(7, 2))];
        let outcome = project(&input, &scenarios, &policy())[0].clone();
        let rounded = outcome.clone().rounded();

        assert_eq!(rounded.corpus, outcome.corpus.round_dp(2));
        assert_eq!(
            rounded.monthly_pension,
            outcome.monthly_pension.round_dp(2)
        );
    }
}
