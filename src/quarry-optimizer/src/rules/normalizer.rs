//! The normalizer that rewrites terms to normal form.
//!
//! The normalizer applies rules in a fixed-point iteration until no rule
//! changes the term. The iteration bound grows with the size of the input,
//! with `max_iterations` as its floor; exceeding it is reported as an
//! invariant violation for that call only.

use common_config::NormalizerConfig;
use common_error::{QuarryError, QuarryResult};
use log::debug;
use quarry_logical::Term;

use super::rule::{NormalizedTerm, RewriteRule, RuleTrace};

/// The normalizer that applies rewrite rules to terms.
///
/// # Rule Order
///
/// The default rules are applied in this order on every iteration:
///
/// 1. Constant folding
/// 2. Beta reduction (R1)
/// 3. Projection reduction (R2)
/// 4. Comprehension fusion (R3)
/// 5. Conditional generators (R4)
/// 6. Collection combinators (R5)
/// 7. Guard normalization
///
/// Any other order reaches an alpha-equivalent fixed point.
pub struct Normalizer {
    /// The rules to apply (in order).
    rules: Vec<Box<dyn RewriteRule>>,
    /// Configuration.
    config: NormalizerConfig,
}

impl Normalizer {
    /// Create a normalizer with the default rules.
    pub fn new() -> Self {
        Self::with_config(NormalizerConfig::default())
    }

    /// Create a normalizer with the default rules and custom config.
    pub fn with_config(config: NormalizerConfig) -> Self {
        Self {
            rules: default_rules(),
            config,
        }
    }

    /// Create a normalizer with the given rules, applied in the given order.
    pub fn with_rules(rules: Vec<Box<dyn RewriteRule>>, config: NormalizerConfig) -> Self {
        Self { rules, config }
    }

    /// Add a rule to the normalizer.
    pub fn add_rule<R: RewriteRule + 'static>(&mut self, rule: R) {
        self.rules.push(Box::new(rule));
    }

    /// Names of the rules, in application order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// The configuration in use.
    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Iteration budget for `term`: one iteration per node, and never fewer
    /// than the configured `max_iterations`.
    pub fn iteration_bound(&self, term: &Term) -> usize {
        self.config.max_iterations.max(term.size())
    }

    /// Rewrite a closed, well-typed term to normal form.
    pub fn normalize(&self, term: Term) -> QuarryResult<NormalizedTerm> {
        let bound = self.iteration_bound(&term);
        let mut current = term;
        let mut iterations = 0;
        let mut total_rules_applied = 0;
        let mut trace = Vec::new();

        loop {
            if iterations >= bound {
                debug!("Normalizer reached max iterations ({bound}), giving up");
                return Err(QuarryError::invariant(format!(
                    "normalization did not reach a fixed point within {bound} iterations"
                )));
            }

            iterations += 1;
            let mut changed_this_iteration = false;

            for rule in &self.rules {
                let before = self.config.enable_trace.then(|| current.to_string());

                let result = rule.apply(current)?;

                if result.changed {
                    changed_this_iteration = true;
                    total_rules_applied += 1;

                    debug!("Rule '{}' applied in iteration {}", rule.name(), iterations);

                    if let Some(before) = before {
                        trace.push(RuleTrace::new(
                            rule.name(),
                            before,
                            result.term.to_string(),
                            true,
                        ));
                    }
                }

                current = result.term;
            }

            if !changed_this_iteration {
                debug!("No changes in iteration {}, reached fixpoint", iterations);
                break;
            }
        }

        Ok(NormalizedTerm {
            term: current,
            iterations,
            rules_applied: total_rules_applied,
            trace,
        })
    }

    /// Apply every rule once, without iterating to a fixed point.
    pub fn normalize_once(&self, term: Term) -> QuarryResult<NormalizedTerm> {
        let mut current = term;
        let mut rules_applied = 0;
        let mut trace = Vec::new();

        for rule in &self.rules {
            let before = self.config.enable_trace.then(|| current.to_string());

            let result = rule.apply(current)?;

            if result.changed {
                rules_applied += 1;

                if let Some(before) = before {
                    trace.push(RuleTrace::new(
                        rule.name(),
                        before,
                        result.term.to_string(),
                        true,
                    ));
                }
            }

            current = result.term;
        }

        Ok(NormalizedTerm {
            term: current,
            iterations: 1,
            rules_applied,
            trace,
        })
    }

    /// Whether no rule applies anywhere in `term`.
    pub fn is_normal_form(&self, term: &Term) -> QuarryResult<bool> {
        for rule in &self.rules {
            if rule.apply(term.clone())?.changed {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// The standard rule set, in the default order.
pub fn default_rules() -> Vec<Box<dyn RewriteRule>> {
    use super::{
        BetaReduction, CollectionCombinators, ComprehensionFusion, ConditionalGenerator,
        ConstantFolding, GuardNormalization, ProjectionReduction,
    };

    vec![
        Box::new(ConstantFolding),
        Box::new(BetaReduction),
        Box::new(ProjectionReduction),
        Box::new(ComprehensionFusion),
        Box::new(ConditionalGenerator),
        Box::new(CollectionCombinators),
        Box::new(GuardNormalization),
    ]
}
