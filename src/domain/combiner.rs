//! Response combiner: propagates demand down the dependency graph and folds
//! values and gradients back up.
//!
//! Children are always visited in configuration order, so the floating-point
//! summation order is fixed and repeated passes are bit-identical.

use tracing::debug;

use crate::domain::{Communicator, DependencyGraph, DomainResult, GradientField, ResponseNode};

/// Push value/gradient demand of every requested top-level response down to
/// its leaves, pre-order.
pub fn request_responses_according_dependencies<C>(graph: &DependencyGraph, communicator: &mut C)
where
    C: Communicator + ?Sized,
{
    for root in graph.roots() {
        if communicator.is_value_requested(root.id()) {
            for leaf in root.leaves() {
                debug!("request value: {} (for {})", leaf.id(), root.id());
                communicator.request_value(leaf.id());
            }
        }
        if communicator.is_gradient_requested(root.id()) {
            for leaf in root.leaves() {
                debug!("request gradient: {} (for {})", leaf.id(), root.id());
                communicator.request_gradient(leaf.id());
            }
        }
    }
}

/// Combine and report every requested top-level response: all values first,
/// then all gradients.
///
/// # Errors
/// `MissingResponse` if a leaf result was never reported. Values of inner
/// composites reported before the failure stay in the communicator.
pub fn combine_responses_according_dependencies<C>(
    graph: &DependencyGraph,
    communicator: &mut C,
) -> DomainResult<()>
where
    C: Communicator + ?Sized,
{
    for root in graph.roots() {
        if !root.is_leaf() && communicator.is_value_requested(root.id()) {
            let value = combine_value(root, communicator)?;
            debug!("combined value: {} = {}", root.id(), value);
            communicator.report_value(root.id(), value);
        }
    }

    for root in graph.roots() {
        if !root.is_leaf() && communicator.is_gradient_requested(root.id()) {
            let gradient = combine_gradient(root, communicator)?;
            debug!("combined gradient: {} ({} points)", root.id(), gradient.len());
            communicator.report_gradient(root.id(), gradient);
        }
    }

    Ok(())
}

/// Standardized value of `node`.
///
/// A composite yields the weighted sum of its children; the value of every
/// composite child is reported under the child's id on the way up.
pub fn combine_value<C>(node: &ResponseNode, communicator: &mut C) -> DomainResult<f64>
where
    C: Communicator + ?Sized,
{
    match node {
        ResponseNode::Leaf { id, .. } => communicator.get_standardized_value(id),
        ResponseNode::Composite { children, .. } => {
            let mut combined = 0.0;
            for child in children {
                let value = combine_value(child, communicator)?;
                if !child.is_leaf() {
                    communicator.report_value(child.id(), value);
                }
                combined += child.weight() * value;
            }
            Ok(combined)
        }
    }
}

/// Standardized gradient of `node`.
///
/// Each child field is scaled by the child's weight and summed per point key.
/// The first child fixes the key set: keys only present in later children are
/// dropped.
pub fn combine_gradient<C>(node: &ResponseNode, communicator: &mut C) -> DomainResult<GradientField>
where
    C: Communicator + ?Sized,
{
    let children = match node {
        ResponseNode::Leaf { id, .. } => return communicator.get_standardized_gradient(id),
        ResponseNode::Composite { children, .. } => children,
    };

    let mut combined: Option<GradientField> = None;

    for child in children {
        let mut gradient = combine_gradient(child, communicator)?;
        if !child.is_leaf() {
            communicator.report_gradient(child.id(), gradient.clone());
        }

        scale(&mut gradient, child.weight());

        match combined.as_mut() {
            None => combined = Some(gradient),
            Some(acc) => accumulate(acc, &gradient, child.id()),
        }
    }

    Ok(combined.unwrap_or_default())
}

fn scale(gradient: &mut GradientField, weight: f64) {
    for vector in gradient.values_mut() {
        vector[0] *= weight;
        vector[1] *= weight;
        vector[2] *= weight;
    }
}

fn accumulate(acc: &mut GradientField, gradient: &GradientField, child_id: &str) {
    let mut dropped = 0usize;
    for (key, vector) in gradient {
        match acc.get_mut(key) {
            Some(target) => {
                target[0] += vector[0];
                target[1] += vector[1];
                target[2] += vector[2];
            }
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        debug!("{}: {} point keys not in accumulator, dropped", child_id, dropped);
    }
}
