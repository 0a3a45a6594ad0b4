//! Intent Classifier
//!
//! Bag-of-words routing over the current input plus chat history:
//! - RiskAnalysis: portfolio risk, diversification, hedging questions
//! - InvestmentPlanning: goals, plans, growth and savings questions
//! - Unknown: neither side wins

use crate::models::Intent;

/// Static keyword tables. "portfolio" sits in both on purpose: it adds to
/// both scores and lets the other keywords decide.
const RISK_KEYWORDS: &[&str] = &[
    "risk", "diversify", "portfolio", "score", "hedge", "exposure", "volatility",
];

const INVESTMENT_KEYWORDS: &[&str] = &[
    "investment", "portfolio", "plan", "goal", "return", "growth", "strategy", "savings",
];

/// Intent classifier
pub struct IntentClassifier;

impl IntentClassifier {
    /// Classify `input` in the context of the rendered chat `history`.
    pub fn detect(input: &str, history: &str) -> Intent {
        let context = format!("{} {}", history, input).to_lowercase();

        let risk_score = keyword_score(&context, RISK_KEYWORDS);
        let investment_score = keyword_score(&context, INVESTMENT_KEYWORDS);

        if risk_score > investment_score {
            Intent::RiskAnalysis
        } else if investment_score > risk_score {
            Intent::InvestmentPlanning
        } else {
            Intent::Unknown
        }
    }
}

/// Free-function form of [`IntentClassifier::detect`]
pub fn detect_intent(input: &str, history: &str) -> Intent {
    IntentClassifier::detect(input, history)
}

/// Number of distinct keywords present as substrings. Repeats do not count.
fn keyword_score(context: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|kw| context.contains(**kw)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_questions() {
        // risk, portfolio, score = 3 vs portfolio = 1
        assert_eq!(
            detect_intent("What is my portfolio risk score?", ""),
            Intent::RiskAnalysis
        );
        assert_eq!(
            detect_intent("How do I hedge my exposure to volatility?", ""),
            Intent::RiskAnalysis
        );
    }

    #[test]
    fn test_investment_questions() {
        let cases = vec![
            "I want a growth investment plan",
            "Help me set a savings goal",
            "what strategy gives the best return?",
        ];

        for c in cases {
            assert_eq!(detect_intent(c, ""), Intent::InvestmentPlanning, "{}", c);
        }
    }

    #[test]
    fn test_ties_are_unknown() {
        assert_eq!(detect_intent("hello there", ""), Intent::Unknown);
        assert_eq!(detect_intent("", ""), Intent::Unknown);
        // portfolio counts for both sides
        assert_eq!(detect_intent("show my portfolio", ""), Intent::Unknown);
        // risk vs plan
        assert_eq!(detect_intent("risk plan", ""), Intent::Unknown);
    }

    #[test]
    fn test_presence_not_frequency() {
        assert_eq!(
            detect_intent("risk risk risk risk growth goal", ""),
            Intent::InvestmentPlanning
        );
    }

    #[test]
    fn test_history_contributes() {
        let history = "Human: how volatile is my hedge exposure?\nAI: fairly volatile";
        assert_eq!(detect_intent("and now?", history), Intent::RiskAnalysis);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(detect_intent("RISK SCORE", ""), Intent::RiskAnalysis);
    }
}
