use super::cluster::{ClusterParameters, ClusterParams};
use crate::config::BoundsConfig;
use crate::error::{GenomeError, Result};
use crate::types::ConvolutionProperties;
use serde::Serialize;

/// Genome for the convolution + cluster learning architecture
///
/// A genome encodes two things:
/// - a convolution topology: an ordered list of levels, each holding one or
///   more parallel convolution types ([`ConvolutionProperties`])
/// - one cluster-parameter bundle per child depth
///
/// plus a handful of scalar genes steering answer turns and perturbation runs.
///
/// # Invariants
///
/// After every public operation:
/// - `cluster_slots().len() == child_depth()` (fixed at construction)
/// - `num_convolution_types().len() == num_convolution_layers() == convolution_topology().len()`
/// - `convolution_topology()[l].len() == num_convolution_types()[l]` for every level
/// - every convolution record satisfies [`ConvolutionProperties::check_structure`]
///
/// Bounds are not stored in the genome; pass the shared [`BoundsConfig`] into
/// each operation and use [`Genome::validate`] to check a genome against it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Genome<P = ClusterParameters> {
    cluster_slots: Box<[Option<P>]>,
    convolution_topology: Vec<Vec<ConvolutionProperties>>,
    num_convolution_types: Vec<usize>,
    num_convolution_layers: usize,
    default_conv_prop: ConvolutionProperties,
    extra_answer_turns: usize,
    num_perturb_runs: usize,
    perturb_chance: f64,
    perturb_factor: f64,
}

impl<P: ClusterParams> Genome<P> {
    /// Empty genome: all slots absent, no convolution levels, zeroed scalars.
    pub fn new(child_depth: usize) -> Self {
        Self {
            cluster_slots: (0..child_depth).map(|_| None).collect(),
            convolution_topology: Vec::new(),
            num_convolution_types: Vec::new(),
            num_convolution_layers: 0,
            default_conv_prop: ConvolutionProperties::default(),
            extra_answer_turns: 0,
            num_perturb_runs: 0,
            perturb_chance: 0.0,
            perturb_factor: 0.0,
        }
    }

    pub fn with_default_conv_prop(child_depth: usize, template: ConvolutionProperties) -> Result<Self> {
        let mut genome = Self::new(child_depth);
        genome.set_default_conv_prop(template)?;
        Ok(genome)
    }

    pub fn child_depth(&self) -> usize {
        self.cluster_slots.len()
    }

    pub fn cluster_slots(&self) -> &[Option<P>] {
        &self.cluster_slots
    }

    pub fn cluster_slot(&self, index: usize) -> Option<&P> {
        self.cluster_slots.get(index).and_then(Option::as_ref)
    }

    pub fn cluster_slot_mut(&mut self, index: usize) -> Option<&mut P> {
        self.cluster_slots.get_mut(index).and_then(Option::as_mut)
    }

    /// Replaces the content of one slot. The slot count never changes.
    pub fn set_cluster_slot(&mut self, index: usize, params: Option<P>) -> Result<()> {
        let depth = self.child_depth();
        let slot = self.cluster_slots.get_mut(index).ok_or_else(|| {
            GenomeError::Range(format!("cluster slot {} outside child depth {}", index, depth))
        })?;
        *slot = params;
        Ok(())
    }

    pub(crate) fn cluster_slots_mut(&mut self) -> &mut [Option<P>] {
        &mut self.cluster_slots
    }

    pub fn has_side_weights(&self) -> bool {
        self.cluster_slots
            .iter()
            .flatten()
            .any(|params| params.has_side_weights())
    }

    pub fn convolution_topology(&self) -> &[Vec<ConvolutionProperties>] {
        &self.convolution_topology
    }

    pub fn num_convolution_types(&self) -> &[usize] {
        &self.num_convolution_types
    }

    pub fn num_convolution_layers(&self) -> usize {
        self.num_convolution_layers
    }

    pub fn default_conv_prop(&self) -> &ConvolutionProperties {
        &self.default_conv_prop
    }

    pub fn set_default_conv_prop(&mut self, template: ConvolutionProperties) -> Result<()> {
        template.check_structure()?;
        self.default_conv_prop = template;
        Ok(())
    }

    pub fn extra_answer_turns(&self) -> usize {
        self.extra_answer_turns
    }

    pub fn num_perturb_runs(&self) -> usize {
        self.num_perturb_runs
    }

    pub fn perturb_chance(&self) -> f64 {
        self.perturb_chance
    }

    pub fn perturb_factor(&self) -> f64 {
        self.perturb_factor
    }

    pub fn set_extra_answer_turns(&mut self, value: usize, bounds: &BoundsConfig) -> Result<()> {
        check_scalar_usize("extra_answer_turns", value, 0, bounds.max_extra_answer_turns)?;
        self.extra_answer_turns = value;
        Ok(())
    }

    pub fn set_num_perturb_runs(&mut self, value: usize, bounds: &BoundsConfig) -> Result<()> {
        check_scalar_usize("num_perturb_runs", value, 0, bounds.max_perturb_runs)?;
        self.num_perturb_runs = value;
        Ok(())
    }

    pub fn set_perturb_chance(&mut self, value: f64) -> Result<()> {
        check_scalar_f64("perturb_chance", value, 0.0, 1.0)?;
        self.perturb_chance = value;
        Ok(())
    }

    pub fn set_perturb_factor(&mut self, value: f64, bounds: &BoundsConfig) -> Result<()> {
        check_scalar_f64(
            "perturb_factor",
            value,
            bounds.min_perturb_factor,
            bounds.max_perturb_factor,
        )?;
        self.perturb_factor = value;
        Ok(())
    }

    pub(crate) fn scalars_mut(&mut self) -> ScalarGenesMut<'_> {
        ScalarGenesMut {
            extra_answer_turns: &mut self.extra_answer_turns,
            num_perturb_runs: &mut self.num_perturb_runs,
            perturb_chance: &mut self.perturb_chance,
            perturb_factor: &mut self.perturb_factor,
        }
    }

    /// Mutable view of one level's convolution records. Only field edits are
    /// possible through it; adding or removing types goes through `push_type`
    /// and `remove_type` so the counts stay in step.
    pub(crate) fn level_mut(&mut self, level: usize) -> Option<&mut [ConvolutionProperties]> {
        self.convolution_topology.get_mut(level).map(Vec::as_mut_slice)
    }

    pub(crate) fn push_level(&mut self, types: Vec<ConvolutionProperties>) {
        self.num_convolution_types.push(types.len());
        self.convolution_topology.push(types);
        self.num_convolution_layers += 1;
        self.debug_check_structure();
    }

    pub(crate) fn remove_level(&mut self, level: usize) -> Vec<ConvolutionProperties> {
        self.num_convolution_types.remove(level);
        self.num_convolution_layers -= 1;
        let removed = self.convolution_topology.remove(level);
        self.debug_check_structure();
        removed
    }

    pub(crate) fn push_type(&mut self, level: usize, props: ConvolutionProperties) {
        self.convolution_topology[level].push(props);
        self.num_convolution_types[level] += 1;
        self.debug_check_structure();
    }

    pub(crate) fn remove_type(&mut self, level: usize, index: usize) -> ConvolutionProperties {
        let removed = self.convolution_topology[level].remove(index);
        self.num_convolution_types[level] -= 1;
        self.debug_check_structure();
        removed
    }

    fn debug_check_structure(&self) {
        debug_assert!(
            self.check_structure().is_ok(),
            "genome structure broken: {:?}",
            self.check_structure()
        );
    }

    /// Checks the length invariants of the topology and every convolution record.
    pub fn check_structure(&self) -> Result<()> {
        if self.num_convolution_types.len() != self.num_convolution_layers
            || self.convolution_topology.len() != self.num_convolution_layers
        {
            return Err(GenomeError::StructuralInvariant(format!(
                "{} convolution layers, {} type counts, {} topology levels",
                self.num_convolution_layers,
                self.num_convolution_types.len(),
                self.convolution_topology.len()
            )));
        }
        for (level, (types, &count)) in self
            .convolution_topology
            .iter()
            .zip(&self.num_convolution_types)
            .enumerate()
        {
            if types.len() != count {
                return Err(GenomeError::StructuralInvariant(format!(
                    "level {} records {} types but holds {}",
                    level,
                    count,
                    types.len()
                )));
            }
            for props in types {
                props.check_structure()?;
            }
        }
        Ok(())
    }

    /// Checks structure, then every gene against `bounds`. Range violations
    /// are reported as [`GenomeError::Range`].
    pub fn validate(&self, bounds: &BoundsConfig) -> Result<()> {
        self.check_structure()?;

        if self.child_depth() != bounds.child_depth {
            return Err(GenomeError::Range(format!(
                "genome has {} cluster slots, bounds require {}",
                self.child_depth(),
                bounds.child_depth
            )));
        }
        for params in self.cluster_slots.iter().flatten() {
            params.validate(bounds)?;
        }

        check_scalar_usize(
            "convolution levels",
            self.num_convolution_layers,
            bounds.min_convolution_levels,
            bounds.max_convolution_levels,
        )?;
        for (level, types) in self.convolution_topology.iter().enumerate() {
            check_scalar_usize(
                "convolutions per level",
                types.len(),
                bounds.min_convolutions,
                bounds.max_convolutions,
            )?;
            for props in types {
                validate_convolution(props, level, bounds)?;
            }
        }

        check_scalar_usize(
            "extra_answer_turns",
            self.extra_answer_turns,
            0,
            bounds.max_extra_answer_turns,
        )?;
        check_scalar_usize("num_perturb_runs", self.num_perturb_runs, 0, bounds.max_perturb_runs)?;
        check_scalar_f64("perturb_chance", self.perturb_chance, 0.0, 1.0)?;
        check_scalar_f64(
            "perturb_factor",
            self.perturb_factor,
            bounds.min_perturb_factor,
            bounds.max_perturb_factor,
        )?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String>
    where
        P: Serialize,
    {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl<P: ClusterParams> Default for Genome<P> {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Borrowed handles to the scalar genes, for the mutation engine.
pub(crate) struct ScalarGenesMut<'a> {
    pub extra_answer_turns: &'a mut usize,
    pub num_perturb_runs: &'a mut usize,
    pub perturb_chance: &'a mut f64,
    pub perturb_factor: &'a mut f64,
}

/// Checks one convolution record against the bounds for its level.
pub fn validate_convolution(props: &ConvolutionProperties, level: usize, bounds: &BoundsConfig) -> Result<()> {
    check_scalar_usize(
        "convolution rank",
        props.rank,
        bounds.min_convolution_rank,
        bounds.max_convolution_rank,
    )?;
    let (min_dim, max_dim) = bounds.convolution_dimension_range(level);
    for &dim in &props.dimensions {
        check_scalar_usize("convolution dimension", dim, min_dim, max_dim)?;
    }
    check_scalar_usize(
        "convolution node layers",
        props.num_layers,
        bounds.min_convolution_node_layers,
        bounds.max_convolution_node_layers,
    )?;
    check_scalar_usize(
        "convolution nodes per layer",
        props.nodes_per_layer,
        bounds.min_convolution_nodes_per_layer,
        bounds.max_convolution_nodes_per_layer,
    )?;
    check_scalar_f64(
        "convolution stepfactor",
        props.stepfactor,
        bounds.min_convolution_step_factor,
        bounds.max_convolution_step_factor,
    )?;
    check_scalar_f64(
        "convolution transfer width",
        props.transfer_width,
        bounds.min_convolution_transfer_width,
        bounds.max_convolution_transfer_width,
    )?;
    Ok(())
}

fn check_scalar_usize(name: &str, value: usize, min: usize, max: usize) -> Result<()> {
    if value < min || value > max {
        return Err(GenomeError::Range(format!("{name} {value} outside [{min}, {max}]")));
    }
    Ok(())
}

fn check_scalar_f64(name: &str, value: f64, min: f64, max: f64) -> Result<()> {
    // NaN fails the range test
    if !(min..=max).contains(&value) {
        return Err(GenomeError::Range(format!("{name} {value} outside [{min}, {max}]")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(rank: usize, dim: usize) -> ConvolutionProperties {
        ConvolutionProperties {
            rank,
            dimensions: vec![dim; rank],
            ..ConvolutionProperties::default()
        }
    }

    #[test]
    fn test_new_genome_is_empty() {
        let genome: Genome = Genome::new(3);
        assert_eq!(genome.child_depth(), 3);
        assert!(genome.cluster_slots().iter().all(Option::is_none));
        assert_eq!(genome.num_convolution_layers(), 0);
        assert!(genome.check_structure().is_ok());
        assert!(!genome.has_side_weights());
    }

    #[test]
    fn test_structural_edits_keep_counts_in_step() {
        let mut genome: Genome = Genome::new(1);
        genome.push_level(vec![props(1, 2), props(2, 3)]);
        genome.push_level(vec![props(1, 2)]);
        assert_eq!(genome.num_convolution_types(), &[2, 1]);

        genome.push_type(1, props(2, 2));
        assert_eq!(genome.num_convolution_types(), &[2, 2]);

        let removed = genome.remove_type(0, 1);
        assert_eq!(removed.rank, 2);
        assert_eq!(genome.num_convolution_types(), &[1, 2]);

        genome.remove_level(0);
        assert_eq!(genome.num_convolution_layers(), 1);
        assert_eq!(genome.num_convolution_types(), &[2]);
        assert!(genome.check_structure().is_ok());
    }

    #[test]
    fn test_validate_reports_range_errors() {
        let bounds = BoundsConfig::default();
        let mut genome: Genome = Genome::new(1);
        genome.push_level(vec![props(1, 10)]);
        genome.push_level(vec![props(1, 5)]);
        genome.perturb_factor = bounds.min_perturb_factor;
        assert!(genome.validate(&bounds).is_ok());

        // Level 1 only admits dimensions up to 5
        genome.level_mut(1).unwrap()[0].dimensions = vec![6];
        assert!(matches!(genome.validate(&bounds), Err(GenomeError::Range(_))));
    }

    #[test]
    fn test_bounded_setters() {
        let bounds = BoundsConfig::default();
        let mut genome: Genome = Genome::new(1);
        assert!(genome.set_perturb_chance(0.3).is_ok());
        assert!(genome.set_perturb_chance(1.3).is_err());
        assert!(genome.set_num_perturb_runs(1, &bounds).is_err());
        assert!(genome.set_extra_answer_turns(bounds.max_extra_answer_turns, &bounds).is_ok());
        assert!(genome.set_cluster_slot(1, None).is_err());
        assert_eq!(genome.perturb_chance(), 0.3);
    }

    #[test]
    fn test_invalid_template_rejected() {
        let template = ConvolutionProperties {
            input_range_end: 4,
            ..ConvolutionProperties::default()
        };
        let result: Result<Genome> = Genome::with_default_conv_prop(1, template);
        assert!(matches!(result, Err(GenomeError::StructuralInvariant(_))));
    }

    #[test]
    fn test_json_export() {
        let mut genome: Genome = Genome::new(2);
        genome.push_level(vec![props(2, 3)]);
        let json = genome.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["num_convolution_layers"], 1);
        assert_eq!(value["cluster_slots"].as_array().map(Vec::len), Some(2));
        assert_eq!(value["convolution_topology"][0][0]["dimensions"], serde_json::json!([3, 3]));
    }
}
