use super::{Block, PlannedBlock, SlotAssignment};
use crate::domain::TimeSlot;

/// Deterministic left-to-right placement used when no optimal assignment is
/// available.
///
/// Blocks are visited in descending per-slot power (ties keep input order).
/// At every slot the power of blocks still running is taken off the slot's
/// capacity, then each unplaced block starts there if it fits in what is
/// left or if this is the last slot it can still start in. Every block is
/// therefore placed, at the price of overflowing capacity when demand is
/// infeasible.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyScheduler;

impl GreedyScheduler {
    /// Returns the placed blocks in input order.
    pub fn place(&self, blocks: &[Block], slots: &[TimeSlot]) -> Vec<PlannedBlock> {
        let slot_count = slots.len();
        let mut order: Vec<usize> = (0..blocks.len()).collect();
        // sort_by is stable
        order.sort_by(|&a, &b| blocks[b].power_per_slot.total_cmp(&blocks[a].power_per_slot));

        let mut starts: Vec<SlotAssignment> = blocks.iter().map(|b| b.start).collect();

        for (index, slot) in slots.iter().enumerate() {
            let mut remaining = slot.capacity_wh;
            for &i in &order {
                if let Some(start) = starts[i].start() {
                    if start + blocks[i].slots_needed > index {
                        remaining -= blocks[i].power_per_slot;
                    }
                }
            }

            for &i in &order {
                let block = &blocks[i];
                if starts[i] != SlotAssignment::Unassigned || index > block.last_start(slot_count) {
                    continue;
                }
                if block.power_per_slot <= remaining || index == block.last_start(slot_count) {
                    starts[i] = SlotAssignment::Assigned(index);
                    remaining -= block.power_per_slot;
                }
            }
        }

        blocks
            .iter()
            .zip(starts)
            .map(|(block, start)| block.place(start.start().unwrap_or_else(|| block.last_start(slot_count))))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::total_overflow;
    use proptest::prelude::*;

    fn block(id: i64, power_per_slot: f64, slots_needed: usize) -> Block {
        Block {
            id,
            power_per_slot,
            slots_needed,
            start: SlotAssignment::Unassigned,
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(GreedyScheduler.place(&[], &[TimeSlot::new(100.0)]).is_empty());
    }

    #[test]
    fn test_single_block_fits_first_slot() {
        let slots = vec![TimeSlot::new(100.0); 4];
        let planned = GreedyScheduler.place(&[block(1, 50.0, 2)], &slots);
        assert_eq!(planned[0].start_slot, 0);
        assert_eq!(total_overflow(&planned, &slots), 0.0);
    }

    #[test]
    fn test_waits_for_capacity() {
        let slots = vec![
            TimeSlot::new(0.0),
            TimeSlot::new(0.0),
            TimeSlot::new(100.0),
            TimeSlot::new(100.0),
            TimeSlot::new(100.0),
        ];
        let planned = GreedyScheduler.place(&[block(1, 80.0, 2)], &slots);
        assert_eq!(planned[0].start_slot, 2);
    }

    #[test]
    fn test_running_blocks_reduce_capacity() {
        let slots = vec![TimeSlot::new(100.0); 6];
        let planned = GreedyScheduler.place(&[block(1, 60.0, 2), block(2, 60.0, 2)], &slots);
        assert_eq!(planned[0].start_slot, 0);
        assert_eq!(planned[1].start_slot, 2);
        assert_eq!(total_overflow(&planned, &slots), 0.0);
    }

    #[test]
    fn test_forced_start_on_last_possible_slot() {
        let slots = vec![TimeSlot::new(10.0); 4];
        let planned = GreedyScheduler.place(&[block(1, 50.0, 2)], &slots);
        assert_eq!(planned[0].start_slot, 2);
    }

    #[test]
    fn test_infeasible_demand_still_places_everything() {
        let slots = vec![TimeSlot::new(100.0); 4];
        let planned = GreedyScheduler.place(&[block(1, 80.0, 4), block(2, 80.0, 4)], &slots);
        assert!(planned.iter().all(|b| b.start_slot == 0));
        assert!((total_overflow(&planned, &slots) - 240.0).abs() < 1e-9);
    }

    #[test]
    fn test_block_longer_than_horizon_starts_at_zero() {
        let slots = vec![TimeSlot::new(100.0); 3];
        let planned = GreedyScheduler.place(&[block(1, 10.0, 5)], &slots);
        assert_eq!(planned[0].start_slot, 0);
    }

    #[test]
    fn test_higher_power_goes_first_and_order_is_preserved() {
        let slots = vec![TimeSlot::new(100.0); 4];
        let planned = GreedyScheduler.place(&[block(1, 40.0, 1), block(2, 90.0, 1)], &slots);
        assert_eq!(planned[0].id, 1);
        assert_eq!(planned[1].id, 2);
        assert_eq!(planned[1].start_slot, 0);
        assert_eq!(planned[0].start_slot, 1);
    }

    fn arb_instance() -> impl Strategy<Value = (Vec<Block>, Vec<TimeSlot>)> {
        let blocks = prop::collection::vec((0.0f64..500.0, 1usize..12), 0..8).prop_map(|v| {
            v.into_iter()
                .enumerate()
                .map(|(i, (p, n))| block(i as i64, p, n))
                .collect::<Vec<_>>()
        });
        let slots = prop::collection::vec((0.0f64..800.0).prop_map(TimeSlot::new), 1..24);
        (blocks, slots)
    }

    proptest! {
        #[test]
        fn prop_every_block_is_placed_within_horizon((blocks, slots) in arb_instance()) {
            let planned = GreedyScheduler.place(&blocks, &slots);
            prop_assert_eq!(planned.len(), blocks.len());
            for (p, b) in planned.iter().zip(&blocks) {
                prop_assert_eq!(p.id, b.id);
                prop_assert!(p.start_slot <= b.last_start(slots.len()));
                if b.slots_needed <= slots.len() {
                    prop_assert!(p.end_slot() <= slots.len());
                } else {
                    prop_assert_eq!(p.start_slot, 0);
                }
            }
        }

        #[test]
        fn prop_placement_is_deterministic((blocks, slots) in arb_instance()) {
            let first = GreedyScheduler.place(&blocks, &slots);
            let second = GreedyScheduler.place(&blocks, &slots);
            prop_assert_eq!(first, second);
        }
    }
}
