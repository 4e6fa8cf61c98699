//! Sequences and sampling of their compressed bone animations.
//!
//! Each sequence stores up to four blended animations.
//! An animation has six curves for each bone for the X, Y, Z position
//! and the X, Y, Z Euler angles.
//! Curves store signed 16-bit values as runs of explicit values that hold their last value.
//! Values are scaled by [scales](crate::skeleton::Bone::scales)
//! and added to [values](crate::skeleton::Bone::values).
use std::collections::BTreeMap;

use glam::{Vec3, vec3};
use log::{error, warn};
use mdl_lib::{
    anim::{ANIM_CHANNELS_SIZE, AnimChannels, AnimValues},
    mdl::{SequenceDescription, StudioHeader},
    offset::OffsetReader,
};
pub use mdl_lib::mdl::{Event, MotionFlags, Pivot, SequenceFlags};

use crate::{
    error::DecodeError,
    read_table,
    skeleton::{Bone, BoneController, ControllerKind, ControllerSlot, Skeleton, bone_reference},
    transform::{BonePose, angle_quaternion, quaternion_slerp},
};

#[derive(Debug, PartialEq, Clone)]
pub struct Sequence {
    pub label: String,
    pub fps: f32,
    pub flags: SequenceFlags,
    pub activity: i32,
    pub activity_weight: i32,
    pub events: Vec<Event>,
    pub frame_count: u32,
    pub pivots: Vec<Pivot>,
    /// Axes of root motion removed from [motion_bone](#structfield.motion_bone).
    pub motion_type: MotionFlags,
    pub motion_bone: Option<usize>,
    pub linear_movement: Vec3,
    pub bb_min: Vec3,
    pub bb_max: Vec3,
    pub blend_count: u32,
    pub blend_types: [MotionFlags; 2],
    pub blend_start: [f32; 2],
    pub blend_end: [f32; 2],
    pub sequence_group: usize,
    pub entry_node: i32,
    pub exit_node: i32,
    pub next_sequence: i32,
    /// The decoded animation or `None` if the data is missing or invalid.
    pub animation: Option<SequenceAnimation>,
}

/// The curves for each blend and bone.
#[derive(Debug, PartialEq, Clone)]
pub struct SequenceAnimation {
    /// Bone animations for each blend with one animation per bone.
    pub blends: Vec<Vec<BoneAnimation>>,
}

#[derive(Debug, Default, PartialEq, Clone)]
pub struct BoneAnimation {
    /// Curves for the X, Y, Z position and X, Y, Z rotation
    /// or `None` to use the bone's default value.
    pub channels: [Option<Curve>; 6],
}

#[derive(Debug, PartialEq, Clone)]
pub struct Curve {
    pub spans: Vec<CurveSpan>,
}

/// A run of `total` frames starting with the explicit `values`.
/// Frames after the explicit values repeat the last value.
#[derive(Debug, PartialEq, Clone)]
pub struct CurveSpan {
    pub total: u8,
    pub values: Vec<i16>,
}

/// Raw runtime inputs for bone controllers and blending.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct ControllerValues {
    /// Inputs for the four general purpose controllers.
    pub controllers: [u8; 4],
    /// Blend weights in `0..=255` for sequences with multiple blends.
    pub blending: [u8; 2],
    /// The mouth input in `0..=64`.
    pub mouth: u8,
}

impl ControllerValues {
    /// Inputs using the rest value for each controller.
    pub fn at_rest(controllers: &[BoneController]) -> Self {
        let mut values = Self::default();
        for controller in controllers {
            let rest = controller.rest.clamp(0, 255) as u8;
            match controller.slot {
                ControllerSlot::General(i) => {
                    if let Some(value) = values.controllers.get_mut(i) {
                        *value = rest;
                    }
                }
                ControllerSlot::Mouth => values.mouth = rest,
                ControllerSlot::Unassigned => (),
            }
        }
        values
    }
}

impl Sequence {
    /// Convert `description` and decode its animation from `bytes` or the `sequence_groups` files.
    pub fn from_description(
        description: &SequenceDescription,
        header: &StudioHeader,
        bytes: &[u8],
        sequence_groups: &BTreeMap<usize, Vec<u8>>,
    ) -> Self {
        let animation = anim_reader(description, header, bytes, sequence_groups).and_then(|reader| {
            SequenceAnimation::read(
                &reader,
                header.bones.len(),
                blend_slots(description.blend_count),
                description.frame_count,
            )
            .inspect_err(|e| {
                error!(
                    "Error decoding animation for sequence {:?}: {e}",
                    description.label
                )
            })
            .ok()
        });

        let reader = OffsetReader::new(bytes);

        Self {
            label: description.label.clone(),
            fps: description.fps,
            flags: description.flags,
            activity: description.activity,
            activity_weight: description.activity_weight,
            events: read_table(
                &reader,
                description.event_offset,
                description.event_count as usize,
                "events",
            ),
            frame_count: description.frame_count,
            pivots: read_table(
                &reader,
                description.pivot_offset,
                description.pivot_count as usize,
                "pivots",
            ),
            motion_type: description.motion_type,
            motion_bone: bone_reference(description.motion_bone, header.bones.len()),
            linear_movement: description.linear_movement.into(),
            bb_min: description.bb_min.into(),
            bb_max: description.bb_max.into(),
            blend_count: description.blend_count,
            blend_types: description.blend_types,
            blend_start: description.blend_start,
            blend_end: description.blend_end,
            sequence_group: description.sequence_group as usize,
            entry_node: description.entry_node,
            exit_node: description.exit_node,
            next_sequence: description.next_sequence,
            animation,
        }
    }

    pub fn is_looping(&self) -> bool {
        self.flags.looping()
    }

    /// The length of the sequence in seconds or `0.0` if the sequence does not play.
    pub fn duration_seconds(&self) -> f32 {
        if self.fps > 0.0 {
            self.frame_count as f32 / self.fps
        } else {
            0.0
        }
    }

    /// Compute the local pose of each bone in `skeleton` at `frame`
    /// or `None` if the animation is unavailable.
    ///
    /// Multiple blends are combined using the blend weights in `values`.
    pub fn sample_poses(
        &self,
        skeleton: &Skeleton,
        frame: f32,
        values: &ControllerValues,
    ) -> Option<Vec<BonePose>> {
        let animation = self.animation.as_ref()?;

        // Negative and NaN frames use the first frame.
        let frame = frame.max(0.0);
        let frame_index = frame as usize;
        let s = frame - frame_index as f32;

        let adjustments = bone_adjustments(&skeleton.controllers, values);
        let missing = BoneAnimation::default();

        let blends: Vec<_> = animation
            .blends
            .iter()
            .map(|bone_animations| {
                let mut poses: Vec<_> = skeleton
                    .bones
                    .iter()
                    .enumerate()
                    .map(|(i, bone)| {
                        let animation = bone_animations.get(i).unwrap_or(&missing);
                        bone_pose(bone, animation, frame_index, s, &adjustments)
                    })
                    .collect();
                self.remove_root_motion(&mut poses);
                poses
            })
            .collect();

        let weights = values.blending.map(|b| b as f32 / 255.0);
        blend_poses(blends, weights)
    }

    fn remove_root_motion(&self, poses: &mut [BonePose]) {
        if let Some(pose) = self.motion_bone.and_then(|i| poses.get_mut(i)) {
            if self.motion_type.x() {
                pose.translation.x = 0.0;
            }
            if self.motion_type.y() {
                pose.translation.y = 0.0;
            }
            if self.motion_type.z() {
                pose.translation.z = 0.0;
            }
        }
    }
}

/// The number of blends actually sampled for a blend count.
fn blend_slots(blend_count: u32) -> usize {
    match blend_count {
        0 | 1 => 1,
        4 => 4,
        _ => 2,
    }
}

/// The reader for the first [AnimChannels] of `description`.
fn anim_reader<'a>(
    description: &SequenceDescription,
    header: &StudioHeader,
    bytes: &'a [u8],
    sequence_groups: &'a BTreeMap<usize, Vec<u8>>,
) -> Option<OffsetReader<'a>> {
    let group = description.sequence_group as usize;
    let result = if group == 0 {
        // Group 0 data is embedded in the main file.
        let Some(sequence_group) = header.sequence_groups.first() else {
            error!("Missing sequence group 0 for {:?}", description.label);
            return None;
        };
        OffsetReader::new(bytes).relative(
            sequence_group.data_offset as u64 + description.anim_offset as u64,
        )
    } else {
        let Some(group_bytes) = sequence_groups.get(&group) else {
            warn!(
                "Sequence group {group} for {:?} is not loaded",
                description.label
            );
            return None;
        };
        OffsetReader::new(group_bytes).relative(description.anim_offset as u64)
    };

    result
        .inspect_err(|e| error!("Error locating animation for {:?}: {e}", description.label))
        .ok()
}

impl SequenceAnimation {
    /// Read `blend_count * bone_count` consecutive [AnimChannels] from `reader`
    /// and the curves covering `frame_count` frames.
    pub fn read(
        reader: &OffsetReader,
        bone_count: usize,
        blend_count: usize,
        frame_count: u32,
    ) -> Result<Self, DecodeError> {
        let blends = (0..blend_count)
            .map(|blend| {
                (0..bone_count)
                    .map(|bone| {
                        let offset = ((blend * bone_count + bone) * ANIM_CHANNELS_SIZE) as u64;
                        BoneAnimation::read(reader, offset, frame_count)
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { blends })
    }
}

impl BoneAnimation {
    fn read(reader: &OffsetReader, offset: u64, frame_count: u32) -> Result<Self, DecodeError> {
        let anim: AnimChannels = reader.read(offset)?;

        // Value offsets are relative to the channels.
        let channel_reader = reader.relative(offset)?;

        let mut channels: [Option<Curve>; 6] = Default::default();
        for (channel, value_offset) in channels.iter_mut().zip(anim.offsets) {
            if value_offset != 0 {
                let values: AnimValues =
                    channel_reader.read_args(value_offset as u64, (frame_count,))?;
                *channel = Some(values.into());
            }
        }

        Ok(Self { channels })
    }
}

impl From<AnimValues> for Curve {
    fn from(value: AnimValues) -> Self {
        Self {
            spans: value
                .spans
                .into_iter()
                .map(|s| CurveSpan {
                    total: s.total,
                    values: s.values,
                })
                .collect(),
        }
    }
}

impl Curve {
    /// The span containing `frame` and the position of `frame` in that span.
    fn find_span(&self, frame: usize) -> Option<(usize, usize)> {
        let mut k = frame;
        for (i, span) in self.spans.iter().enumerate() {
            let total = span.total as usize;
            if total > k {
                return Some((i, k));
            }
            k -= total;
        }
        None
    }

    /// The last value of the last span with values.
    fn final_value(&self) -> f32 {
        self.spans
            .iter()
            .rev()
            .find_map(|s| s.values.last())
            .map(|v| *v as f32)
            .unwrap_or_default()
    }

    fn next_first_value(&self, span_index: usize) -> Option<f32> {
        self.spans
            .get(span_index + 1)
            .and_then(|s| s.values.first())
            .map(|v| *v as f32)
    }

    /// The values at `frame` and `frame + 1` for rotation channels.
    pub fn sample_pair(&self, frame: usize) -> (f32, f32) {
        let Some((i, k)) = self.find_span(frame) else {
            let value = self.final_value();
            return (value, value);
        };

        let span = &self.spans[i];
        let valid = span.values.len();
        let total = span.total as usize;
        let last = span.values.last().map(|v| *v as f32).unwrap_or_default();

        if valid > k {
            let value1 = span.values[k] as f32;
            let value2 = if valid > k + 1 {
                span.values[k + 1] as f32
            } else if total > k + 1 {
                value1
            } else {
                self.next_first_value(i).unwrap_or(last)
            };
            (value1, value2)
        } else {
            // Repeated frames after the explicit values.
            let value2 = if total > k + 1 {
                last
            } else {
                self.next_first_value(i).unwrap_or(last)
            };
            (last, value2)
        }
    }

    /// The value at `frame` interpolated towards `frame + 1` by `s` for position channels.
    pub fn sample(&self, frame: usize, s: f32) -> f32 {
        let Some((i, k)) = self.find_span(frame) else {
            return self.final_value();
        };

        let span = &self.spans[i];
        let valid = span.values.len();
        let total = span.total as usize;
        let last = span.values.last().map(|v| *v as f32).unwrap_or_default();

        if valid > k {
            if valid > k + 1 {
                span.values[k] as f32 * (1.0 - s) + s * span.values[k + 1] as f32
            } else {
                // Position does not interpolate into the next span here.
                span.values[k] as f32
            }
        } else if total <= k + 1 {
            let next = self.next_first_value(i).unwrap_or(last);
            last * (1.0 - s) + s * next
        } else {
            last
        }
    }
}

/// Compute the adjustment in radians or units for each controller from the raw `values`.
pub fn bone_adjustments(controllers: &[BoneController], values: &ControllerValues) -> Vec<f32> {
    controllers
        .iter()
        .map(|c| {
            let value = match c.slot {
                ControllerSlot::Mouth => {
                    let t = (values.mouth as f32 / 64.0).min(1.0);
                    (1.0 - t) * c.start + t * c.end
                }
                ControllerSlot::General(_) | ControllerSlot::Unassigned => {
                    let raw = match c.slot {
                        ControllerSlot::General(i) => {
                            values.controllers.get(i).copied().unwrap_or_default()
                        }
                        _ => 0,
                    } as f32;

                    if c.wraps() {
                        raw * (360.0 / 256.0) + c.start
                    } else {
                        let t = (raw / 255.0).clamp(0.0, 1.0);
                        (1.0 - t) * c.start + t * c.end
                    }
                }
            };

            match c.kind() {
                ControllerKind::Rotation => value.to_radians(),
                ControllerKind::Translation => value,
                ControllerKind::None => 0.0,
            }
        })
        .collect()
}

/// Sample the local pose for `bone` at `frame` interpolated towards the next frame by `s`.
pub fn bone_pose(
    bone: &Bone,
    animation: &BoneAnimation,
    frame: usize,
    s: f32,
    adjustments: &[f32],
) -> BonePose {
    let adjustment =
        |channel: usize| bone.controller_indices[channel].and_then(|i| adjustments.get(i).copied());

    let mut angle1 = [0.0f32; 3];
    let mut angle2 = [0.0f32; 3];
    for j in 0..3 {
        let channel = j + 3;
        match &animation.channels[channel] {
            Some(curve) => {
                let (value1, value2) = curve.sample_pair(frame);
                angle1[j] = bone.values[channel] + value1 * bone.scales[channel];
                angle2[j] = bone.values[channel] + value2 * bone.scales[channel];
            }
            None => {
                angle1[j] = bone.values[channel];
                angle2[j] = angle1[j];
            }
        }

        if let Some(adjustment) = adjustment(channel) {
            angle1[j] += adjustment;
            angle2[j] += adjustment;
        }
    }

    // Identical angles would produce NaN when interpolating.
    let rotation = if angle1 != angle2 {
        quaternion_slerp(
            angle_quaternion(Vec3::from(angle1)),
            angle_quaternion(Vec3::from(angle2)),
            s,
        )
    } else {
        angle_quaternion(Vec3::from(angle1))
    };

    let mut position = [0.0f32; 3];
    for (j, value) in position.iter_mut().enumerate() {
        *value = bone.values[j];
        if let Some(curve) = &animation.channels[j] {
            *value += curve.sample(frame, s) * bone.scales[j];
        }
        if let Some(adjustment) = adjustment(j) {
            *value += adjustment;
        }
    }

    BonePose {
        translation: vec3(position[0], position[1], position[2]),
        rotation,
    }
}

/// Combine the poses for each blend pairwise with one weight per level.
///
/// Two blends use `weights[0]`.
/// Four blends combine blends 0 and 1 and blends 2 and 3 with `weights[0]`
/// and then the two results with `weights[1]`.
pub fn blend_poses(blends: Vec<Vec<BonePose>>, weights: [f32; 2]) -> Option<Vec<BonePose>> {
    let mut level = blends;
    let mut weight_index = 0;
    while level.len() > 1 {
        let weight = weights[weight_index.min(weights.len() - 1)];
        level = level
            .chunks(2)
            .map(|pair| match pair {
                [a, b] => a.iter().zip(b).map(|(a, b)| a.blend(*b, weight)).collect(),
                _ => pair[0].clone(),
            })
            .collect();
        weight_index += 1;
    }
    level.pop()
}
