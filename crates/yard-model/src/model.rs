//! 宣告式最佳化模型
//!
//! 模型由變數、具名的約束族與單一最小化目標組成，不依賴任何求解器。
//! 每個約束族由一條純規則產生：對索引集合中的每個元素回傳 `Option<Row>`，
//! `None` 表示該索引不產生約束。

use crate::{ModelError, Result};
use std::collections::HashSet;
use std::fmt;

/// 變數ID（模型內的稠密索引）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub usize);

/// 變數定義域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// 非負整數
    NonNegativeInteger,
    /// 0/1
    Binary,
    /// 非負實數
    NonNegativeReal,
}

impl Domain {
    pub fn is_integral(self) -> bool {
        !matches!(self, Domain::NonNegativeReal)
    }
}

/// 變數
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub domain: Domain,
}

/// 線性運算式 Σ coef·var + constant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(VarId, f64)>,
    constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    /// 單一變數
    pub fn var(var: VarId) -> Self {
        Self::new().plus(1.0, var)
    }

    /// 變數總和
    pub fn sum(vars: impl IntoIterator<Item = VarId>) -> Self {
        let mut expr = Self::new();
        for var in vars {
            expr.add_term(1.0, var);
        }
        expr
    }

    /// 建構器模式：加上一項
    pub fn plus(mut self, coef: f64, var: VarId) -> Self {
        self.add_term(coef, var);
        self
    }

    /// 建構器模式：加上常數
    pub fn plus_constant(mut self, value: f64) -> Self {
        self.constant += value;
        self
    }

    /// 建構器模式：加上另一個運算式的倍數
    pub fn plus_expr(mut self, coef: f64, other: &LinearExpr) -> Self {
        for (var, c) in &other.terms {
            self.add_term(coef * c, *var);
        }
        self.constant += coef * other.constant;
        self
    }

    pub fn add_term(&mut self, coef: f64, var: VarId) {
        if coef != 0.0 {
            self.terms.push((var, coef));
        }
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn constant_part(&self) -> f64 {
        self.constant
    }

    /// 以變數值計算
    pub fn eval(&self, values: &VarValues) -> f64 {
        self.terms
            .iter()
            .map(|(var, coef)| coef * values.get(*var))
            .sum::<f64>()
            + self.constant
    }

    /// 合併同一變數的係數並移除零項
    fn compact(mut self) -> Self {
        self.terms.sort_by_key(|(var, _)| *var);
        let mut merged: Vec<(VarId, f64)> = Vec::with_capacity(self.terms.len());
        for (var, coef) in self.terms {
            match merged.last_mut() {
                Some((last, acc)) if *last == var => *acc += coef,
                _ => merged.push((var, coef)),
            }
        }
        merged.retain(|(_, coef)| *coef != 0.0);
        self.terms = merged;
        self
    }
}

/// 關係
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// ≤
    Le,
    /// ≥
    Ge,
    /// =
    Eq,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Relation::Le => "<=",
            Relation::Ge => ">=",
            Relation::Eq => "=",
        };
        write!(f, "{}", symbol)
    }
}

/// 一條約束：`lhs (關係) rhs`，所有變數項都在左邊，常數在右邊
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub lhs: LinearExpr,
    pub relation: Relation,
    pub rhs: f64,
}

impl Row {
    /// 由兩個運算式建立，變數項移到左邊、常數移到右邊
    pub fn new(lhs: LinearExpr, relation: Relation, rhs: LinearExpr) -> Self {
        let rhs_value = rhs.constant - lhs.constant;
        let mut merged = LinearExpr::new().plus_expr(1.0, &lhs).plus_expr(-1.0, &rhs);
        merged.constant = 0.0;
        Self {
            lhs: merged.compact(),
            relation,
            rhs: rhs_value,
        }
    }

    pub fn le(lhs: LinearExpr, rhs: LinearExpr) -> Self {
        Self::new(lhs, Relation::Le, rhs)
    }

    pub fn ge(lhs: LinearExpr, rhs: LinearExpr) -> Self {
        Self::new(lhs, Relation::Ge, rhs)
    }

    pub fn equals(lhs: LinearExpr, rhs: LinearExpr) -> Self {
        Self::new(lhs, Relation::Eq, rhs)
    }

    /// 以容許誤差檢查是否成立
    pub fn is_satisfied(&self, values: &VarValues, tolerance: f64) -> bool {
        let lhs = self.lhs.eval(values);
        match self.relation {
            Relation::Le => lhs <= self.rhs + tolerance,
            Relation::Ge => lhs >= self.rhs - tolerance,
            Relation::Eq => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

/// 帶標籤的約束，例如 `demand_load[expo-dry-20,t1]`
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub label: String,
    pub row: Row,
}

/// 約束族
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintFamily {
    pub name: String,
    pub constraints: Vec<Constraint>,
}

impl ConstraintFamily {
    /// 對索引集合套用規則產生約束族
    pub fn build<I>(
        name: &str,
        indices: impl IntoIterator<Item = I>,
        label: impl Fn(&I) -> String,
        rule: impl Fn(&I) -> Option<Row>,
    ) -> Self {
        let constraints = indices
            .into_iter()
            .filter_map(|index| {
                rule(&index).map(|row| Constraint {
                    label: format!("{}[{}]", name, label(&index)),
                    row,
                })
            })
            .collect();
        Self {
            name: name.to_string(),
            constraints,
        }
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }
}

/// 約束位置：(約束族, 族內序號)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstraintRef {
    pub family: usize,
    pub index: usize,
}

/// 稠密的變數區塊，最多三維
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarBlock {
    first: usize,
    dims: [usize; 3],
}

impl VarBlock {
    pub fn at3(&self, i: usize, j: usize, k: usize) -> VarId {
        debug_assert!(i < self.dims[0] && j < self.dims[1] && k < self.dims[2]);
        VarId(self.first + (i * self.dims[1] + j) * self.dims[2] + k)
    }

    pub fn at2(&self, i: usize, j: usize) -> VarId {
        self.at3(i, j, 0)
    }

    pub fn at1(&self, i: usize) -> VarId {
        self.at3(i, 0, 0)
    }

    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 變數值（以 [`VarId`] 索引）
#[derive(Debug, Clone, PartialEq)]
pub struct VarValues(Vec<f64>);

impl VarValues {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// 全零（用於沒有解時的預設）
    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    pub fn get(&self, var: VarId) -> f64 {
        self.0.get(var.0).copied().unwrap_or(0.0)
    }

    /// 四捨五入為非負整數
    pub fn get_count(&self, var: VarId) -> u32 {
        let value = self.get(var).round();
        if value <= 0.0 {
            0
        } else {
            value as u32
        }
    }

    pub fn is_set(&self, var: VarId) -> bool {
        self.get(var) >= 0.5
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// 宣告式模型
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub name: String,
    variables: Vec<Variable>,
    families: Vec<ConstraintFamily>,
    objective: LinearExpr,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: Vec::new(),
            families: Vec::new(),
            objective: LinearExpr::new(),
        }
    }

    pub fn add_var(&mut self, name: String, domain: Domain) -> VarId {
        self.variables.push(Variable { name, domain });
        VarId(self.variables.len() - 1)
    }

    /// 新增一個稠密變數區塊，`label` 產生索引部分的名稱
    pub fn add_var_block(
        &mut self,
        name: &str,
        dims: [usize; 3],
        domain: Domain,
        label: impl Fn(usize, usize, usize) -> String,
    ) -> VarBlock {
        let first = self.variables.len();
        for i in 0..dims[0] {
            for j in 0..dims[1] {
                for k in 0..dims[2] {
                    self.variables.push(Variable {
                        name: format!("{}[{}]", name, label(i, j, k)),
                        domain,
                    });
                }
            }
        }
        VarBlock { first, dims }
    }

    pub fn add_family(&mut self, family: ConstraintFamily) {
        tracing::trace!("約束族 {}：{} 條", family.name, family.len());
        self.families.push(family);
    }

    pub fn set_objective(&mut self, objective: LinearExpr) {
        self.objective = objective.compact();
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn families(&self) -> &[ConstraintFamily] {
        &self.families
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn family(&self, name: &str) -> Option<&ConstraintFamily> {
        self.families.iter().find(|f| f.name == name)
    }

    pub fn constraint_count(&self) -> usize {
        self.families.iter().map(ConstraintFamily::len).sum()
    }

    pub fn constraint(&self, at: ConstraintRef) -> Option<&Constraint> {
        self.families.get(at.family)?.constraints.get(at.index)
    }

    /// 所有約束的位置（依族、族內順序）
    pub fn constraint_refs(&self) -> Vec<ConstraintRef> {
        self.families
            .iter()
            .enumerate()
            .flat_map(|(family, f)| {
                (0..f.len()).map(move |index| ConstraintRef { family, index })
            })
            .collect()
    }

    /// 只保留選定約束的子模型；變數與目標不變，族的順序不變
    pub fn restricted(&self, keep: &HashSet<ConstraintRef>) -> Model {
        let families = self
            .families
            .iter()
            .enumerate()
            .map(|(fi, family)| ConstraintFamily {
                name: family.name.clone(),
                constraints: family
                    .constraints
                    .iter()
                    .enumerate()
                    .filter(|(ci, _)| keep.contains(&ConstraintRef { family: fi, index: *ci }))
                    .map(|(_, c)| c.clone())
                    .collect(),
            })
            .collect();
        Model {
            name: self.name.clone(),
            variables: self.variables.clone(),
            families,
            objective: self.objective.clone(),
        }
    }

    /// 檢查變數引用與係數
    pub fn validate(&self) -> Result<()> {
        let count = self.variables.len();
        let check = |expr: &LinearExpr, owner: &str| -> Result<()> {
            for (var, coef) in expr.terms() {
                if var.0 >= count {
                    return Err(ModelError::UnknownVariable {
                        var: var.0,
                        owner: owner.to_string(),
                    });
                }
                if !coef.is_finite() {
                    return Err(ModelError::NonFiniteCoefficient(owner.to_string()));
                }
            }
            if !expr.constant_part().is_finite() {
                return Err(ModelError::NonFiniteCoefficient(owner.to_string()));
            }
            Ok(())
        };

        check(&self.objective, "objective")?;
        for family in &self.families {
            for c in &family.constraints {
                check(&c.row.lhs, &c.label)?;
                if !c.row.rhs.is_finite() {
                    return Err(ModelError::NonFiniteCoefficient(c.label.clone()));
                }
            }
        }
        Ok(())
    }

    /// 列出在給定變數值下不成立的約束標籤
    pub fn violated(&self, values: &VarValues, tolerance: f64) -> Vec<String> {
        self.families
            .iter()
            .flat_map(|f| f.constraints.iter())
            .filter(|c| !c.row.is_satisfied(values, tolerance))
            .map(|c| c.label.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn two_var_model() -> (Model, VarId, VarId) {
        let mut model = Model::new("test");
        let x = model.add_var("x".to_string(), Domain::NonNegativeInteger);
        let y = model.add_var("y".to_string(), Domain::Binary);
        (model, x, y)
    }

    #[test]
    fn test_row_moves_constants_right() {
        let (_, x, y) = two_var_model();
        // x + 2 <= 3y + 5  =>  x - 3y <= 3
        let row = Row::le(
            LinearExpr::var(x).plus_constant(2.0),
            LinearExpr::new().plus(3.0, y).plus_constant(5.0),
        );
        assert_eq!(row.lhs.terms(), &[(x, 1.0), (y, -3.0)]);
        assert_eq!(row.rhs, 3.0);
        assert_eq!(row.lhs.constant_part(), 0.0);
    }

    #[rstest]
    #[case(Relation::Le, 2.0, true)]
    #[case(Relation::Le, 1.5, false)]
    #[case(Relation::Ge, 2.5, false)]
    #[case(Relation::Ge, 2.0, true)]
    #[case(Relation::Eq, 2.0, true)]
    #[case(Relation::Eq, 2.1, false)]
    fn test_row_satisfaction(#[case] relation: Relation, #[case] rhs: f64, #[case] expected: bool) {
        let (_, x, _) = two_var_model();
        let row = Row {
            lhs: LinearExpr::var(x),
            relation,
            rhs,
        };
        assert_eq!(row.is_satisfied(&VarValues::new(vec![2.0, 0.0]), 1e-6), expected);
    }

    #[test]
    fn test_row_merges_duplicate_terms() {
        let (_, x, _) = two_var_model();
        let row = Row::equals(LinearExpr::sum([x, x]), LinearExpr::var(x));
        assert_eq!(row.lhs.terms(), &[(x, 1.0)]);
    }

    #[test]
    fn test_family_rule_may_skip() {
        let (_, x, _) = two_var_model();
        let family = ConstraintFamily::build(
            "even",
            0..5,
            |i| format!("t{}", i),
            |i| (i % 2 == 0).then(|| Row::le(LinearExpr::var(x), LinearExpr::constant(*i as f64))),
        );
        assert_eq!(family.len(), 3);
        assert_eq!(family.constraints[1].label, "even[t2]");
    }

    #[test]
    fn test_var_block_offsets() {
        let mut model = Model::new("grid");
        model.add_var("z".to_string(), Domain::NonNegativeReal);
        let block = model.add_var_block("f", [2, 3, 4], Domain::NonNegativeInteger, |i, j, k| {
            format!("{},{},{}", i, j, k)
        });
        assert_eq!(block.len(), 24);
        assert_eq!(block.at3(0, 0, 0), VarId(1));
        assert_eq!(block.at3(1, 2, 3), VarId(24));
        assert_eq!(model.variables()[block.at3(1, 0, 2).0].name, "f[1,0,2]");
    }

    #[test]
    fn test_restricted_keeps_selected() {
        let (mut model, x, y) = two_var_model();
        model.add_family(ConstraintFamily::build(
            "a",
            0..3,
            |i| i.to_string(),
            |_| Some(Row::le(LinearExpr::var(x), LinearExpr::constant(1.0))),
        ));
        model.add_family(ConstraintFamily::build(
            "b",
            0..1,
            |i| i.to_string(),
            |_| Some(Row::ge(LinearExpr::var(y), LinearExpr::constant(1.0))),
        ));
        assert_eq!(model.constraint_count(), 4);

        let keep: HashSet<_> = [ConstraintRef { family: 0, index: 2 }].into_iter().collect();
        let sub = model.restricted(&keep);
        assert_eq!(sub.constraint_count(), 1);
        assert_eq!(sub.families()[0].constraints[0].label, "a[2]");
        assert!(sub.families()[1].is_empty());
    }

    #[test]
    fn test_violations() {
        let (mut model, x, y) = two_var_model();
        model.add_family(ConstraintFamily::build(
            "cap",
            0..1,
            |_| String::new(),
            |_| Some(Row::le(LinearExpr::var(x), LinearExpr::new().plus(4.0, y))),
        ));
        let ok = VarValues::new(vec![3.0, 1.0]);
        let bad = VarValues::new(vec![3.0, 0.0]);
        assert!(model.violated(&ok, 1e-6).is_empty());
        assert_eq!(model.violated(&bad, 1e-6), vec!["cap[]".to_string()]);
    }

    #[test]
    fn test_validate_rejects_unknown_variable() {
        let (mut model, _, _) = two_var_model();
        model.set_objective(LinearExpr::var(VarId(9)));
        assert!(matches!(
            model.validate(),
            Err(ModelError::UnknownVariable { var: 9, .. })
        ));
    }
}
