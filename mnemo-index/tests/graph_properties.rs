// Copyright 2025 Mnemo Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Property tests for the knowledge-graph invariants.

use mnemo_core::{Learning, LearningCategory};
use mnemo_index::{EntityGraphBuilder, EntityKind, EntityNode, TopologyStore};
use proptest::prelude::*;

proptest! {
    /// No matter how co-occurrence observations interleave directions and
    /// weights, both endpoints always report the same accumulated weight.
    #[test]
    fn cooccurrence_weight_symmetric(
        observations in proptest::collection::vec((any::<bool>(), 0.1f32..5.0), 1..30)
    ) {
        let store = TopologyStore::new();
        for (flip, weight) in &observations {
            if *flip {
                store.add_cooccurrence("left", "right", *weight);
            } else {
                store.add_cooccurrence("right", "left", *weight);
            }
        }

        let from_left = store.cooccurring("left", 0.0, 10);
        let from_right = store.cooccurring("right", 0.0, 10);
        prop_assert_eq!(from_left.len(), 1);
        prop_assert_eq!(from_right.len(), 1);
        prop_assert!((from_left[0].1 - from_right[0].1).abs() < 1e-4);
    }

    /// Re-adding an entity any number of times never decreases its
    /// mention count and never drops a recorded learning.
    #[test]
    fn entity_merge_monotonic(rounds in 1usize..25) {
        let builder = EntityGraphBuilder::new();
        let mut last_count = 0;
        let mut learning_ids = Vec::new();

        for round in 0..rounds {
            let learning = Learning::new(
                LearningCategory::Fact,
                format!("observation {round} about redis"),
                vec![],
                0.8,
            );
            learning_ids.push(learning.id());
            let id = builder.add_entity(EntityNode::new(EntityKind::Tech, "redis"), learning.id());

            let node = builder.get_entity(id).unwrap();
            prop_assert!(node.mention_count as usize > last_count);
            last_count = node.mention_count as usize;
            for lid in &learning_ids {
                prop_assert!(node.related_learnings.contains(lid));
            }
        }
    }
}
