use glam::{Affine3A, Vec3};
use log::{error, warn};
use mdl_lib::mdl::{MOTION_TYPES, MotionFlags, StudioHeader};

use crate::{
    error::{ReferenceKind, check_reference},
    transform::{BonePose, angle_quaternion, model_space_transforms},
};

/// The bone hierarchy and the controllers that adjust it at runtime.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct Skeleton {
    /// The bones with parents before their children.
    pub bones: Vec<Bone>,
    pub controllers: Vec<BoneController>,
}

/// A single node in the skeleton heirarchy.
#[derive(Debug, PartialEq, Clone)]
pub struct Bone {
    pub name: String,
    /// The index of the parent [Bone] in [bones](struct.Skeleton.html#structfield.bones)
    /// or `None` if this is a root bone.
    pub parent_index: Option<usize>,
    pub flags: u32,
    /// The index in [controllers](struct.Skeleton.html#structfield.controllers)
    /// for the X, Y, Z position and X, Y, Z rotation channels.
    pub controller_indices: [Option<usize>; 6],
    /// The default X, Y, Z position and X, Y, Z rotation in radians.
    pub values: [f32; 6],
    /// The scale for compressed animation values for each channel.
    pub scales: [f32; 6],
}

/// A runtime input mapped onto a channel of one or more bones.
#[derive(Debug, PartialEq, Clone)]
pub struct BoneController {
    pub bone_index: Option<usize>,
    pub motion_type: MotionFlags,
    pub start: f32,
    pub end: f32,
    /// The raw input value when idle.
    pub rest: i32,
    pub slot: ControllerSlot,
}

/// The input value used by a [BoneController].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ControllerSlot {
    /// One of the four general purpose controllers.
    General(usize),
    /// The mouth controller driven by speech.
    Mouth,
    /// An invalid negative slot that always uses an input of `0`.
    Unassigned,
}

/// The type of adjustment applied by a [BoneController].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ControllerKind {
    Translation,
    Rotation,
    /// Any other type, which has no effect.
    None,
}

impl BoneController {
    /// Controllers that wrap around instead of clamping to the range.
    pub fn wraps(&self) -> bool {
        self.motion_type.rloop()
    }

    pub fn kind(&self) -> ControllerKind {
        // Only a single type bit is supported.
        match u32::from(self.motion_type) & MOTION_TYPES {
            mdl_lib::mdl::MOTION_X | mdl_lib::mdl::MOTION_Y | mdl_lib::mdl::MOTION_Z => {
                ControllerKind::Translation
            }
            mdl_lib::mdl::MOTION_XR | mdl_lib::mdl::MOTION_YR | mdl_lib::mdl::MOTION_ZR => {
                ControllerKind::Rotation
            }
            _ => ControllerKind::None,
        }
    }
}

impl ControllerSlot {
    fn from_index(index: i32) -> Self {
        match usize::try_from(index) {
            Ok(i) if i <= 3 => Self::General(i),
            Ok(_) => Self::Mouth,
            Err(_) => Self::Unassigned,
        }
    }
}

impl Skeleton {
    /// Validate the bones and controllers in `header`.
    ///
    /// Invalid references are logged and replaced with `None`.
    pub fn from_header(header: &StudioHeader) -> Self {
        let bone_count = header.bones.len();
        let controller_count = header.bone_controllers.len();

        let bones = header
            .bones
            .iter()
            .enumerate()
            .map(|(i, bone)| {
                let parent_index = bone_reference(bone.parent_index, bone_count);
                if let Some(parent) = parent_index
                    && parent >= i
                {
                    warn!(
                        "Parent index {parent} for bone {i} {:?} does not appear before the bone",
                        bone.name
                    );
                }

                Bone {
                    name: bone.name.clone(),
                    parent_index,
                    flags: bone.flags,
                    controller_indices: bone.bone_controllers.map(|c| {
                        let index = usize::try_from(c).ok()?;
                        check_reference(ReferenceKind::BoneController, index, controller_count)
                            .inspect_err(|e| error!("Error assigning controller to bone {i}: {e}"))
                            .ok()
                    }),
                    values: bone.values,
                    scales: bone.scales,
                }
            })
            .collect();

        let controllers = header
            .bone_controllers
            .iter()
            .map(|c| BoneController {
                bone_index: bone_reference(c.bone_index, bone_count),
                motion_type: c.motion_type,
                start: c.start,
                end: c.end,
                rest: c.rest,
                slot: ControllerSlot::from_index(c.index),
            })
            .collect();

        Self { bones, controllers }
    }

    /// The parent index for each bone in [bones](#structfield.bones).
    pub fn parent_indices(&self) -> Vec<Option<usize>> {
        self.bones.iter().map(|b| b.parent_index).collect()
    }

    /// The model space transform of each bone using the default values with no animation.
    pub fn model_space_transforms(&self) -> Vec<Affine3A> {
        let poses: Vec<_> = self
            .bones
            .iter()
            .map(|b| BonePose {
                translation: Vec3::from_slice(&b.values[..3]),
                rotation: angle_quaternion(Vec3::from_slice(&b.values[3..])),
            })
            .collect();
        model_space_transforms(&poses, &self.parent_indices())
    }
}

/// Convert a file bone index where `-1` means no bone.
pub(crate) fn bone_reference(index: i32, bone_count: usize) -> Option<usize> {
    let index = usize::try_from(index).ok()?;
    check_reference(ReferenceKind::Bone, index, bone_count)
        .inspect_err(|e| error!("Error resolving bone reference: {e}"))
        .ok()
}
