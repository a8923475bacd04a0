//! Optimization container: per-build artifact tables.
//!
//! A container holds everything the model builder registers for one build
//! (variable and constraint handles, parameters, expressions, initial
//! conditions) plus the values read back after a solve. Every table is laid
//! out time-major over its component axis.

use crate::settings::Settings;
use chrono::{DateTime, Utc};
use gs_core::{ArtifactKind, ContainerKey, GsError, GsResult};
use std::collections::BTreeMap;
use tracing::debug;

/// Opaque handle on a solver variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableRef(u32);

impl VariableRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Opaque handle on a solver constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintRef(u32);

impl ConstraintRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Component-by-time table, stored time-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Table<T> {
    components: Vec<String>,
    time_steps: usize,
    data: Vec<T>,
}

/// Table of numeric values.
pub type ValueTable = Table<f64>;

impl<T: Copy> Table<T> {
    pub fn filled(components: Vec<String>, time_steps: usize, value: T) -> Self {
        let data = vec![value; components.len() * time_steps];
        Self {
            components,
            time_steps,
            data,
        }
    }

    /// Build from a function of `(component index, time step)`.
    pub fn from_fn(components: Vec<String>, time_steps: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let width = components.len();
        let mut data = Vec::with_capacity(width * time_steps);
        for t in 0..time_steps {
            for c in 0..width {
                data.push(f(c, t));
            }
        }
        Self {
            components,
            time_steps,
            data,
        }
    }

    /// Wrap time-major data. Fails if the length does not match the shape.
    pub fn from_data(components: Vec<String>, time_steps: usize, data: Vec<T>) -> GsResult<Self> {
        if data.len() != components.len() * time_steps {
            return Err(GsError::invalid_argument(format!(
                "table data has {} values, expected {} components x {} steps",
                data.len(),
                components.len(),
                time_steps
            )));
        }
        Ok(Self {
            components,
            time_steps,
            data,
        })
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn time_steps(&self) -> usize {
        self.time_steps
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Time-major flattened values.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    fn position(&self, component: &str, t: usize) -> Option<usize> {
        if t >= self.time_steps {
            return None;
        }
        let c = self.components.iter().position(|name| name == component)?;
        Some(t * self.components.len() + c)
    }

    pub fn get(&self, component: &str, t: usize) -> Option<T> {
        self.position(component, t).map(|i| self.data[i])
    }

    pub fn set(&mut self, component: &str, t: usize, value: T) -> GsResult<()> {
        let i = self.position(component, t).ok_or_else(|| {
            GsError::key_not_found(format!("component {component} at step {t}"))
        })?;
        self.data[i] = value;
        Ok(())
    }

    /// Same shape, each cell mapped through a fallible function.
    pub fn try_map<U, E>(&self, mut f: impl FnMut(T) -> Result<U, E>) -> Result<Table<U>, E> {
        let data = self.data.iter().map(|v| f(*v)).collect::<Result<Vec<_>, E>>()?;
        Ok(Table {
            components: self.components.clone(),
            time_steps: self.time_steps,
            data,
        })
    }
}

/// Owns the artifacts of one build. Replaced wholesale on reset.
#[derive(Debug)]
pub struct OptimizationContainer {
    settings: Settings,
    initial_time: Option<DateTime<Utc>>,
    next_variable: u32,
    next_constraint: u32,
    variables: BTreeMap<ContainerKey, Table<VariableRef>>,
    constraints: BTreeMap<ContainerKey, Table<ConstraintRef>>,
    parameters: BTreeMap<ContainerKey, ValueTable>,
    expressions: BTreeMap<ContainerKey, ValueTable>,
    initial_conditions: BTreeMap<ContainerKey, BTreeMap<String, f64>>,
    primal_values: BTreeMap<ContainerKey, ValueTable>,
    aux_variables: BTreeMap<ContainerKey, ValueTable>,
    duals: BTreeMap<ContainerKey, ValueTable>,
}

fn expect_kind(key: &ContainerKey, kind: ArtifactKind) -> GsResult<()> {
    if key.kind != kind {
        return Err(GsError::invalid_argument(format!(
            "key {key} registered as {kind}"
        )));
    }
    Ok(())
}

fn insert_unique<V>(map: &mut BTreeMap<ContainerKey, V>, key: ContainerKey, value: V) -> GsResult<&V> {
    use std::collections::btree_map::Entry;
    match map.entry(key) {
        Entry::Occupied(e) => Err(GsError::consistency(format!(
            "{} is already registered",
            e.key()
        ))),
        Entry::Vacant(e) => Ok(e.insert(value)),
    }
}

fn lookup<'a, V>(map: &'a BTreeMap<ContainerKey, V>, key: &ContainerKey) -> GsResult<&'a V> {
    map.get(key)
        .ok_or_else(|| GsError::key_not_found(key.to_string()))
}

impl OptimizationContainer {
    pub fn new(settings: Settings) -> Self {
        Self {
            initial_time: settings.initial_time,
            settings,
            next_variable: 0,
            next_constraint: 0,
            variables: BTreeMap::new(),
            constraints: BTreeMap::new(),
            parameters: BTreeMap::new(),
            expressions: BTreeMap::new(),
            initial_conditions: BTreeMap::new(),
            primal_values: BTreeMap::new(),
            aux_variables: BTreeMap::new(),
            duals: BTreeMap::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn time_steps(&self) -> usize {
        self.settings.horizon
    }

    pub fn initial_time(&self) -> Option<DateTime<Utc>> {
        self.initial_time
    }

    /// Register one variable per component and time step.
    pub fn add_variables(
        &mut self,
        key: ContainerKey,
        components: Vec<String>,
    ) -> GsResult<&Table<VariableRef>> {
        expect_kind(&key, ArtifactKind::Variable)?;
        if self.variables.contains_key(&key) {
            return Err(GsError::consistency(format!("{key} is already registered")));
        }
        let start = self.next_variable;
        let table = renumber(components, self.time_steps(), start, VariableRef);
        self.next_variable = start + table.len() as u32;
        debug!(key = %key, count = table.len(), "variables registered");
        insert_unique(&mut self.variables, key, table)
    }

    /// Register one constraint per component and time step.
    pub fn add_constraints(
        &mut self,
        key: ContainerKey,
        components: Vec<String>,
    ) -> GsResult<&Table<ConstraintRef>> {
        expect_kind(&key, ArtifactKind::Constraint)?;
        if self.constraints.contains_key(&key) {
            return Err(GsError::consistency(format!("{key} is already registered")));
        }
        let start = self.next_constraint;
        let table = renumber(components, self.time_steps(), start, ConstraintRef);
        self.next_constraint = start + table.len() as u32;
        debug!(key = %key, count = table.len(), "constraints registered");
        insert_unique(&mut self.constraints, key, table)
    }

    pub fn add_parameter(&mut self, key: ContainerKey, values: ValueTable) -> GsResult<()> {
        expect_kind(&key, ArtifactKind::Parameter)?;
        insert_unique(&mut self.parameters, key, values).map(|_| ())
    }

    pub fn add_expression(&mut self, key: ContainerKey, values: ValueTable) -> GsResult<()> {
        expect_kind(&key, ArtifactKind::Expression)?;
        insert_unique(&mut self.expressions, key, values).map(|_| ())
    }

    /// Store an initial condition. Re-setting the same value is a no-op; a
    /// different value for the same component is a conflict.
    pub fn set_initial_condition(
        &mut self,
        key: ContainerKey,
        component: impl Into<String>,
        value: f64,
    ) -> GsResult<()> {
        expect_kind(&key, ArtifactKind::InitialCondition)?;
        let component = component.into();
        let entries = self.initial_conditions.entry(key.clone()).or_default();
        match entries.get(&component) {
            Some(existing) if *existing != value => Err(GsError::consistency(format!(
                "initial condition {key} for {component} is {existing}, refusing {value}"
            ))),
            Some(_) => Ok(()),
            None => {
                entries.insert(component, value);
                Ok(())
            }
        }
    }

    pub fn initial_condition(&self, key: &ContainerKey, component: &str) -> GsResult<f64> {
        lookup(&self.initial_conditions, key)?
            .get(component)
            .copied()
            .ok_or_else(|| GsError::key_not_found(format!("{key} for {component}")))
    }

    pub fn variable(&self, key: &ContainerKey) -> GsResult<&Table<VariableRef>> {
        lookup(&self.variables, key)
    }

    pub fn constraint(&self, key: &ContainerKey) -> GsResult<&Table<ConstraintRef>> {
        lookup(&self.constraints, key)
    }

    pub fn parameter(&self, key: &ContainerKey) -> GsResult<&ValueTable> {
        lookup(&self.parameters, key)
    }

    pub fn expression(&self, key: &ContainerKey) -> GsResult<&ValueTable> {
        lookup(&self.expressions, key)
    }

    /// Solved value table for a variable key.
    pub fn primal_value(&self, key: &ContainerKey) -> GsResult<&ValueTable> {
        lookup(&self.primal_values, key)
    }

    pub fn aux_variable(&self, key: &ContainerKey) -> GsResult<&ValueTable> {
        lookup(&self.aux_variables, key)
    }

    /// Dual table, keyed by the constraint key re-kinded as `Dual`.
    pub fn dual(&self, key: &ContainerKey) -> GsResult<&ValueTable> {
        lookup(&self.duals, key)
    }

    pub fn variables(&self) -> impl Iterator<Item = (&ContainerKey, &Table<VariableRef>)> {
        self.variables.iter()
    }

    pub fn constraints(&self) -> impl Iterator<Item = (&ContainerKey, &Table<ConstraintRef>)> {
        self.constraints.iter()
    }

    /// Every solved table (primal, aux, dual) in key order.
    pub fn solved_tables(&self) -> impl Iterator<Item = (&ContainerKey, &ValueTable)> {
        self.primal_values
            .iter()
            .chain(self.aux_variables.iter())
            .chain(self.duals.iter())
    }

    pub fn variable_count(&self) -> usize {
        self.next_variable as usize
    }

    pub fn constraint_count(&self) -> usize {
        self.next_constraint as usize
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    pub fn expression_count(&self) -> usize {
        self.expressions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
            && self.constraints.is_empty()
            && self.parameters.is_empty()
            && self.expressions.is_empty()
            && self.initial_conditions.is_empty()
    }

    pub(crate) fn record_primal(&mut self, key: ContainerKey, values: ValueTable) {
        self.primal_values.insert(key, values);
    }

    pub(crate) fn record_dual(&mut self, key: ContainerKey, values: ValueTable) {
        self.duals.insert(key.as_kind(ArtifactKind::Dual), values);
    }

    pub(crate) fn record_aux(&mut self, key: ContainerKey, values: ValueTable) {
        self.aux_variables.insert(key, values);
    }
}

/// Handles numbered consecutively from `start` in time-major order.
fn renumber<H: Copy>(components: Vec<String>, time_steps: usize, start: u32, make: fn(u32) -> H) -> Table<H> {
    let width = components.len();
    Table::from_fn(components, time_steps, |c, t| make(start + (t * width + c) as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gs_core::Resolution;

    fn container() -> OptimizationContainer {
        let settings = Settings::new(3, Resolution::from_minutes(60).unwrap()).unwrap();
        OptimizationContainer::new(settings)
    }

    fn units() -> Vec<String> {
        vec!["gen1".to_string(), "gen2".to_string()]
    }

    #[test]
    fn variable_handles_are_unique_across_tables() {
        let mut c = container();
        let p = ContainerKey::variable("ActivePower", "Thermal");
        let on = ContainerKey::variable("OnStatus", "Thermal");
        let first: Vec<_> = c.add_variables(p, units()).unwrap().data().to_vec();
        let second: Vec<_> = c.add_variables(on, units()).unwrap().data().to_vec();
        assert_eq!(first.len(), 6);
        assert_eq!(first[0].index(), 0);
        assert_eq!(second[0].index(), 6);
        assert_eq!(c.variable_count(), 12);
    }

    #[test]
    fn duplicate_registration_is_a_conflict() {
        let mut c = container();
        let key = ContainerKey::constraint("RampUp", "Thermal");
        c.add_constraints(key.clone(), units()).unwrap();
        let err = c.add_constraints(key, units()).unwrap_err();
        assert!(matches!(err, GsError::Consistency { .. }));
        assert_eq!(c.constraint_count(), 6);
    }

    #[test]
    fn wrong_kind_rejected() {
        let mut c = container();
        let key = ContainerKey::constraint("RampUp", "Thermal");
        assert!(matches!(
            c.add_variables(key, units()),
            Err(GsError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn initial_condition_conflicts() {
        let mut c = container();
        let key = ContainerKey::new(ArtifactKind::InitialCondition, "DeviceStatus", "Thermal");
        c.set_initial_condition(key.clone(), "gen1", 1.0).unwrap();
        c.set_initial_condition(key.clone(), "gen1", 1.0).unwrap();
        let err = c.set_initial_condition(key.clone(), "gen1", 0.0).unwrap_err();
        assert!(matches!(err, GsError::Consistency { .. }));
        assert_eq!(c.initial_condition(&key, "gen1").unwrap(), 1.0);
        assert!(matches!(
            c.initial_condition(&key, "gen2"),
            Err(GsError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn missing_lookup_is_key_not_found() {
        let c = container();
        let key = ContainerKey::parameter("Demand", "PowerLoad");
        assert!(matches!(c.parameter(&key), Err(GsError::KeyNotFound { .. })));
    }

    #[test]
    fn table_is_time_major() {
        let table = Table::from_fn(units(), 2, |c, t| (t * 10 + c) as f64);
        assert_eq!(table.data(), &[0.0, 1.0, 10.0, 11.0]);
        assert_eq!(table.get("gen2", 1), Some(11.0));
        assert_eq!(table.get("gen3", 0), None);
        assert_eq!(table.get("gen1", 2), None);
    }

    #[test]
    fn from_data_checks_shape() {
        assert!(Table::from_data(units(), 2, vec![0.0; 3]).is_err());
        let mut table = Table::from_data(units(), 2, vec![0.0; 4]).unwrap();
        table.set("gen1", 1, 5.0).unwrap();
        assert_eq!(table.data()[2], 5.0);
    }
}
