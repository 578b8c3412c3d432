/*!
 * Presentation times for access units that arrive in decode order.
 *
 * Each group of pictures starts at a frame with display order 0. Inside a group, frames are put
 * in display order and frame `p` of the resulting sequence is presented at `unit * (p + max_delta)`,
 * where `max_delta` is the largest distance any frame moved towards the front. The shift keeps every
 * presentation time at or after the frame's decode time.
 */

/// Position of one access unit in decode and display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOrder {
    pub decode_order: u32,
    /// Resets to 0 at the start of each group of pictures.
    pub display_order: u32,
}

impl FrameOrder {
    pub fn new(decode_order: u32, display_order: u32) -> Self {
        Self {
            decode_order,
            display_order,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reordered {
    /// Presentation time of each frame, in the order the frames were given.
    pub presentation_times: Vec<u64>,
    pub max_delta: u64,
}

/// Computes presentation times for `frames`, given in decode order, `unit` ticks apart.
pub fn reorder(frames: &[FrameOrder], unit: u64) -> Reordered {
    let mut display_sequence: Vec<usize> = (0..frames.len()).collect();
    if frames.len() > 1 {
        for group in group_ranges(frames) {
            sort_by_display_order(&mut display_sequence[group], frames);
        }
    }

    let max_delta = max_delta(frames, &display_sequence);
    let mut presentation_times = vec![0u64; frames.len()];
    for (position, frame) in display_sequence.iter().enumerate() {
        presentation_times[*frame] = unit * (position as u64 + max_delta);
    }

    Reordered {
        presentation_times,
        max_delta,
    }
}

/// Largest `decode_order - position` over the display sequence, or 0 when nothing moved forward.
fn max_delta(frames: &[FrameOrder], display_sequence: &[usize]) -> u64 {
    display_sequence
        .iter()
        .enumerate()
        .map(|(position, frame)| {
            u64::from(frames[*frame].decode_order).saturating_sub(position as u64)
        })
        .max()
        .unwrap_or(0)
}

fn group_ranges(frames: &[FrameOrder]) -> Vec<std::ops::Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    for (i, frame) in frames.iter().enumerate().skip(1) {
        if frame.display_order == 0 {
            ranges.push(start..i);
            start = i;
        }
    }
    ranges.push(start..frames.len());
    ranges
}

/// Quicksort with a Hoare partition around the middle element. Ties may land on either side.
fn sort_by_display_order(items: &mut [usize], frames: &[FrameOrder]) {
    if items.len() < 2 {
        return;
    }
    let split = partition(items, frames);
    let (low, high) = items.split_at_mut(split + 1);
    sort_by_display_order(low, frames);
    sort_by_display_order(high, frames);
}

fn partition(items: &mut [usize], frames: &[FrameOrder]) -> usize {
    let key = |item: usize| frames[item].display_order;
    let pivot = key(items[(items.len() - 1) / 2]);
    let mut i = 0;
    let mut j = items.len() - 1;
    loop {
        while key(items[i]) < pivot {
            i += 1;
        }
        while key(items[j]) > pivot {
            j -= 1;
        }
        if i >= j {
            return j;
        }
        items.swap(i, j);
        i += 1;
        j -= 1;
    }
}
