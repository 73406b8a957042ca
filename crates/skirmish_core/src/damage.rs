//! Damage calculation.
//!
//! Two ways to compute the damage one unit deals to another:
//!
//! - the classic stats formula ([`calculate_damage_stats`]), used for walls
//!   and whenever no formula is configured;
//! - a data-driven [`DamageFormula`] expression evaluated against the
//!   attacker and defender.
//!
//! Both draw from the synchronized RNG so results are identical on every
//! participant.

use serde::{Deserialize, Serialize};

use crate::rng::SyncRng;

/// Combat-relevant values of one side of an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CombatStats {
    /// Current hit points.
    pub hp: i32,
    /// Maximum hit points.
    pub max_hp: i32,
    /// Armor subtracted from basic damage.
    pub armor: i32,
    /// Damage reduced by armor.
    pub basic_damage: i32,
    /// Damage that ignores armor.
    pub piercing_damage: i32,
    /// Bloodlust doubles outgoing damage.
    pub bloodlust: bool,
}

/// Attribute read by a [`DamageFormula`] leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stat {
    /// Current hit points.
    Hp,
    /// Maximum hit points.
    MaxHp,
    /// Armor.
    Armor,
    /// Basic damage.
    BasicDamage,
    /// Piercing damage.
    PiercingDamage,
    /// 1 when bloodlusted, otherwise 0.
    Bloodlust,
}

impl Stat {
    const fn read(self, stats: &CombatStats) -> i32 {
        match self {
            Self::Hp => stats.hp,
            Self::MaxHp => stats.max_hp,
            Self::Armor => stats.armor,
            Self::BasicDamage => stats.basic_damage,
            Self::PiercingDamage => stats.piercing_damage,
            Self::Bloodlust => stats.bloodlust as i32,
        }
    }
}

/// Integer expression tree computing damage from attacker and defender.
///
/// # Example RON
///
/// ```ron
/// Max(Const(1), Sub(Attacker(BasicDamage), Defender(Armor)))
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageFormula {
    /// Literal value.
    Const(i32),
    /// Attribute of the attacking unit.
    Attacker(Stat),
    /// Attribute of the defending unit.
    Defender(Stat),
    /// Sum.
    Add(Box<DamageFormula>, Box<DamageFormula>),
    /// Difference.
    Sub(Box<DamageFormula>, Box<DamageFormula>),
    /// Product.
    Mul(Box<DamageFormula>, Box<DamageFormula>),
    /// Truncating quotient; division by zero yields zero.
    Div(Box<DamageFormula>, Box<DamageFormula>),
    /// Smaller operand.
    Min(Box<DamageFormula>, Box<DamageFormula>),
    /// Larger operand.
    Max(Box<DamageFormula>, Box<DamageFormula>),
    /// Random value in `0..n`, zero when `n <= 0`.
    Rand(Box<DamageFormula>),
}

impl DamageFormula {
    /// Evaluate the expression.
    pub fn eval(&self, attacker: &CombatStats, defender: &CombatStats, rng: &mut SyncRng) -> i32 {
        let bin = |a: &Self, b: &Self, rng: &mut SyncRng| {
            (a.eval(attacker, defender, rng), b.eval(attacker, defender, rng))
        };
        match self {
            Self::Const(v) => *v,
            Self::Attacker(stat) => stat.read(attacker),
            Self::Defender(stat) => stat.read(defender),
            Self::Add(a, b) => {
                let (a, b) = bin(a, b, rng);
                a.saturating_add(b)
            }
            Self::Sub(a, b) => {
                let (a, b) = bin(a, b, rng);
                a.saturating_sub(b)
            }
            Self::Mul(a, b) => {
                let (a, b) = bin(a, b, rng);
                a.saturating_mul(b)
            }
            Self::Div(a, b) => {
                let (a, b) = bin(a, b, rng);
                a.checked_div(b).unwrap_or(0)
            }
            Self::Min(a, b) => {
                let (a, b) = bin(a, b, rng);
                a.min(b)
            }
            Self::Max(a, b) => {
                let (a, b) = bin(a, b, rng);
                a.max(b)
            }
            Self::Rand(n) => {
                let n = n.eval(attacker, defender, rng);
                rng.below(n)
            }
        }
    }
}

/// Classic stats damage.
///
/// ```text
/// multiplier = bloodlust ? 2 : 1
/// damage     = max(1, basic * multiplier - armor) + piercing * multiplier
/// damage    -= rand % ((damage + 2) / 2)
/// ```
///
/// The result is at least 1 whenever the attacker has any damage at all.
pub fn calculate_damage_stats(
    basic_damage: i32,
    piercing_damage: i32,
    armor: i32,
    bloodlust: bool,
    rng: &mut SyncRng,
) -> i32 {
    let multiplier = if bloodlust { 2 } else { 1 };
    let mut damage = (basic_damage * multiplier - armor).max(1) + piercing_damage * multiplier;
    damage -= rng.below((damage + 2) / 2);
    debug_assert!(damage >= 0, "stats damage must not be negative");
    damage
}

/// Damage `attacker` deals to `defender`.
///
/// Uses the configured formula when present, otherwise the stats formula.
/// Never negative.
pub fn calculate_damage(
    formula: Option<&DamageFormula>,
    attacker: &CombatStats,
    defender: &CombatStats,
    rng: &mut SyncRng,
) -> i32 {
    match formula {
        Some(formula) => formula.eval(attacker, defender, rng).max(0),
        None => calculate_damage_stats(
            attacker.basic_damage,
            attacker.piercing_damage,
            defender.armor,
            attacker.bloodlust,
            rng,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(basic: i32, piercing: i32, armor: i32) -> CombatStats {
        CombatStats {
            hp: 60,
            max_hp: 60,
            armor,
            basic_damage: basic,
            piercing_damage: piercing,
            bloodlust: false,
        }
    }

    #[test]
    fn test_stats_damage_range() {
        let mut rng = SyncRng::new(1);
        // base = max(1, 9 - 2) + 3 = 10, variance 0..6
        for _ in 0..200 {
            let d = calculate_damage_stats(9, 3, 2, false, &mut rng);
            assert!((5..=10).contains(&d), "damage {d} out of range");
        }
    }

    #[test]
    fn test_stats_damage_minimum_one() {
        let mut rng = SyncRng::new(2);
        for _ in 0..200 {
            let d = calculate_damage_stats(1, 0, 50, false, &mut rng);
            assert_eq!(d, 1);
        }
    }

    #[test]
    fn test_bloodlust_doubles() {
        let mut rng = SyncRng::new(3);
        // base = max(1, 20 - 0) + 4 = 24, variance 0..13
        for _ in 0..200 {
            let d = calculate_damage_stats(10, 2, 0, true, &mut rng);
            assert!((12..=24).contains(&d));
        }
    }

    #[test]
    fn test_formula_eval() {
        let mut rng = SyncRng::new(4);
        let formula = DamageFormula::Max(
            Box::new(DamageFormula::Const(1)),
            Box::new(DamageFormula::Sub(
                Box::new(DamageFormula::Attacker(Stat::BasicDamage)),
                Box::new(DamageFormula::Defender(Stat::Armor)),
            )),
        );
        assert_eq!(formula.eval(&stats(12, 0, 0), &stats(0, 0, 5), &mut rng), 7);
        assert_eq!(formula.eval(&stats(3, 0, 0), &stats(0, 0, 5), &mut rng), 1);
    }

    #[test]
    fn test_formula_div_by_zero() {
        let mut rng = SyncRng::new(5);
        let formula = DamageFormula::Div(
            Box::new(DamageFormula::Const(10)),
            Box::new(DamageFormula::Defender(Stat::Armor)),
        );
        assert_eq!(formula.eval(&stats(0, 0, 0), &stats(0, 0, 0), &mut rng), 0);
    }

    #[test]
    fn test_calculate_damage_clamps_formula() {
        let mut rng = SyncRng::new(6);
        let formula = DamageFormula::Const(-8);
        let d = calculate_damage(Some(&formula), &stats(1, 1, 1), &stats(1, 1, 1), &mut rng);
        assert_eq!(d, 0);
    }

    #[test]
    fn test_formula_from_ron() {
        let formula: DamageFormula =
            ron::from_str("Add(Attacker(PiercingDamage), Const(2))").expect("valid formula");
        let mut rng = SyncRng::new(7);
        assert_eq!(formula.eval(&stats(0, 5, 0), &stats(0, 0, 0), &mut rng), 7);
    }
}
