// Queue family negotiation
//
// Graphics is always required, present when a surface is involved, compute
// when the caps ask for it. Each purpose takes the first family, in
// enumeration order, that has queues and the needed capability. A family
// chosen for several purposes gets a single queue-create entry.

use ash::vk;
use renderplug::{DriverError, QueuePurpose};

/// One `VkDeviceQueueCreateInfo` worth of data.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueCreateEntry {
    pub family_index: u32,
    pub priorities: Vec<f32>,
}

/// Families resolved for each purpose plus the deduplicated create entries.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuePlan {
    pub graphics: u32,
    pub present: Option<u32>,
    pub compute: Option<u32>,
    pub entries: Vec<QueueCreateEntry>,
}

/// First family whose flags contain `flags` and which exposes at least one queue.
pub fn find_queue_family(families: &[vk::QueueFamilyProperties], flags: vk::QueueFlags) -> Option<u32> {
    families
        .iter()
        .position(|family| family.queue_count > 0 && family.queue_flags.contains(flags))
        .map(|index| index as u32)
}

/// First family with queues that is listed in `present_families`.
///
/// Presentation support is queried per surface and does not follow from any
/// queue flag.
pub fn find_present_family(families: &[vk::QueueFamilyProperties], present_families: &[u32]) -> Option<u32> {
    families
        .iter()
        .enumerate()
        .find(|(index, family)| family.queue_count > 0 && present_families.contains(&(*index as u32)))
        .map(|(index, _)| index as u32)
}

/// Resolves every required purpose or fails naming the first one that can't be met.
pub fn plan_queues(
    families: &[vk::QueueFamilyProperties],
    present_families: Option<&[u32]>,
    needs_compute: bool,
) -> Result<QueuePlan, DriverError> {
    let graphics = find_queue_family(families, vk::QueueFlags::GRAPHICS)
        .ok_or(DriverError::NoSuitableQueueFamily(QueuePurpose::Graphics))?;

    let present = match present_families {
        Some(supported) => Some(
            find_present_family(families, supported).ok_or(DriverError::NoSuitableQueueFamily(QueuePurpose::Present))?,
        ),
        None => None,
    };

    let compute = if needs_compute {
        Some(
            find_queue_family(families, vk::QueueFlags::COMPUTE)
                .ok_or(DriverError::NoSuitableQueueFamily(QueuePurpose::Compute))?,
        )
    } else {
        None
    };

    let mut entries: Vec<QueueCreateEntry> = Vec::with_capacity(3);
    for family_index in [Some(graphics), present, compute].into_iter().flatten() {
        if !entries.iter().any(|entry| entry.family_index == family_index) {
            entries.push(QueueCreateEntry {
                family_index,
                priorities: vec![1.0],
            });
        }
    }

    Ok(QueuePlan {
        graphics,
        present,
        compute,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, queue_count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count,
            ..Default::default()
        }
    }

    #[test]
    fn test_separate_graphics_and_compute_families() {
        let families = [family(vk::QueueFlags::GRAPHICS, 1), family(vk::QueueFlags::COMPUTE, 1)];
        let plan = plan_queues(&families, None, true).unwrap();

        assert_eq!(plan.graphics, 0);
        assert_eq!(plan.compute, Some(1));
        assert_eq!(plan.entries.len(), 2);
        assert_eq!(plan.entries[0].family_index, 0);
        assert_eq!(plan.entries[1].family_index, 1);
    }

    #[test]
    fn test_shared_family_yields_one_entry() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 1)];
        let plan = plan_queues(&families, None, true).unwrap();

        assert_eq!(plan.graphics, 0);
        assert_eq!(plan.compute, Some(0));
        assert_eq!(plan.entries, vec![QueueCreateEntry { family_index: 0, priorities: vec![1.0] }]);
    }

    #[test]
    fn test_missing_compute_family_is_named() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 4)];
        let err = plan_queues(&families, None, true).unwrap_err();

        assert!(matches!(err, DriverError::NoSuitableQueueFamily(QueuePurpose::Compute)));
        assert_eq!(err.to_string(), "no suitable compute queue family");
    }

    #[test]
    fn test_missing_graphics_family_is_named() {
        let families = [family(vk::QueueFlags::COMPUTE, 1)];
        let err = plan_queues(&families, None, false).unwrap_err();
        assert_eq!(err.to_string(), "no suitable graphics queue family");
    }

    #[test]
    fn test_graphics_family_that_presents_is_reused() {
        let families = [family(vk::QueueFlags::GRAPHICS, 1), family(vk::QueueFlags::GRAPHICS, 1)];
        let plan = plan_queues(&families, Some(&[0, 1]), false).unwrap();

        assert_eq!(plan.present, Some(0));
        assert_eq!(plan.entries.len(), 1);
    }

    #[test]
    fn test_present_on_other_family() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 1), family(vk::QueueFlags::TRANSFER, 1)];
        let plan = plan_queues(&families, Some(&[1]), true).unwrap();

        assert_eq!(plan.graphics, 0);
        assert_eq!(plan.present, Some(1));
        assert_eq!(plan.compute, Some(0));
        let indices: Vec<u32> = plan.entries.iter().map(|e| e.family_index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_no_present_family() {
        let families = [family(vk::QueueFlags::GRAPHICS, 1)];
        let err = plan_queues(&families, Some(&[]), false).unwrap_err();
        assert!(matches!(err, DriverError::NoSuitableQueueFamily(QueuePurpose::Present)));
    }

    #[test]
    fn test_empty_families_are_skipped() {
        let families = [family(vk::QueueFlags::GRAPHICS, 0), family(vk::QueueFlags::GRAPHICS, 2)];
        assert_eq!(find_queue_family(&families, vk::QueueFlags::GRAPHICS), Some(1));
        assert_eq!(find_present_family(&families, &[0, 1]), Some(1));
    }

    #[test]
    fn test_selection_is_deterministic() {
        let families = [
            family(vk::QueueFlags::TRANSFER, 1),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 16),
            family(vk::QueueFlags::COMPUTE, 8),
        ];
        let first = plan_queues(&families, Some(&[1, 2]), true).unwrap();
        for _ in 0..8 {
            assert_eq!(plan_queues(&families, Some(&[1, 2]), true).unwrap(), first);
        }
        assert_eq!(first.compute, Some(1));
    }
}
