use super::types::{Character, ImportError, ImportOptions};
use crate::{
    animation::{Animation, Channel, ClipBuilder, Interpolation},
    arm_error::ArmError,
    skeleton::{JointDesc, Skeleton, SkeletonBuilder},
    util,
};
use ahash::{HashMap, HashMapExt};
use gltf::{
    accessor::Iter, animation::util::ReadOutputs, buffer::Data, Document,
    Gltf, Node,
};
use log::{debug, error, info, warn};
use nalgebra_glm as glm;
use std::{fs, io, path::Path};

#[derive(Clone, Debug)]
struct NodeInfo {
    name: String,
    parent: Option<usize>,
    translation: glm::Vec3,
    rotation: glm::Quat,
    scale: glm::Vec3,
}

/// Coordinate conversion applied to everything that is imported
#[derive(Copy, Clone, Debug)]
struct Convert {
    swizzle: bool,
    scale: f32,
}

impl Convert {
    const fn new(options: &ImportOptions) -> Self {
        Self {
            swizzle: options.swizzle,
            scale: options.scale,
        }
    }

    /// Converts a position from Y axis up to Z axis up and scales it
    fn position(self, v: &glm::Vec3) -> glm::Vec3 {
        let v = if self.swizzle {
            glm::vec3(v.x, -v.z, v.y)
        } else {
            *v
        };
        v * self.scale
    }

    /// Swaps the Y and Z scale factors when swizzling
    fn scale(self, v: &glm::Vec3) -> glm::Vec3 {
        if self.swizzle {
            glm::vec3(v.x, v.z, v.y)
        } else {
            *v
        }
    }

    /// Converts a rotation from Y axis up to Z axis up
    fn rotation(self, q: &glm::Quat) -> glm::Quat {
        if self.swizzle {
            glm::quat(q.i, -q.k, q.j, q.w)
        } else {
            *q
        }
    }

    /// Converts a matrix by conjugating with the swizzle and scale
    fn matrix(self, m: &glm::Mat4) -> glm::Mat4 {
        let s = self.scale;
        let mut c = glm::scaling(&glm::vec3(s, s, s));
        if self.swizzle {
            c *= glm::rotation(
                std::f32::consts::FRAC_PI_2,
                &glm::vec3(1.0, 0.0, 0.0),
            );
        }
        let c_inv = glm::inverse(&c);
        c * m * c_inv
    }
}

fn load_impl<P>(path: P) -> Result<(Document, Vec<Data>), ArmError>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let base = path.parent().unwrap_or_else(|| Path::new("./"));
    let file = fs::File::open(path)?;
    let reader = io::BufReader::new(file);
    let gltf = Gltf::from_reader(reader)?;
    let buffers = gltf::import_buffers(&gltf.document, Some(base), gltf.blob)?;
    info!(
        "{:?}, base path={:?}, buffer count={}",
        path,
        base,
        buffers.len(),
    );
    Ok((gltf.document, buffers))
}

/// Loads a character from a glTF or glb file
///
/// The file must have exactly one skin. Its joints, in the order listed by
/// the skin, become the skeleton with that order as the original joint
/// index. Every animation in the file becomes a clip for the skeleton.
///
/// # Errors
/// May return `ArmError`
pub fn load(
    path: &Path,
    options: &ImportOptions,
) -> Result<Character, ArmError> {
    let (document, buffers) = load_impl(path)?;
    character(&document, &buffers, options)
}

/// Loads a character from glTF data in memory. External buffers are not
/// supported but embedded base64 buffers and glb blobs are.
///
/// # Errors
/// May return `ArmError`
pub fn load_slice(
    bytes: &[u8],
    options: &ImportOptions,
) -> Result<Character, ArmError> {
    let gltf = Gltf::from_slice(bytes)?;
    let buffers = gltf::import_buffers(&gltf.document, None, gltf.blob)?;
    debug!("loaded {} buffers from slice", buffers.len());
    character(&gltf.document, &buffers, options)
}

fn character(
    document: &Document,
    buffers: &[Data],
    options: &ImportOptions,
) -> Result<Character, ArmError> {
    let (skeleton, node_to_joint) = load_skeleton(document, buffers, options)?;
    let animations = load_animations(
        document,
        buffers,
        &skeleton,
        &node_to_joint,
        options,
    )?;
    info!(
        "skeleton {} with {} joints, {} animations",
        skeleton.name(),
        skeleton.joint_count(),
        animations.len()
    );
    Ok(Character {
        skeleton,
        animations,
    })
}

/// Recursive node tree traversal
fn traverse_tree(
    node: &Node,
    tree: &mut HashMap<usize, NodeInfo>,
    parent: Option<usize>,
) {
    for child in node.children() {
        traverse_tree(&child, tree, Some(node.index()));
    }

    let name = node
        .name()
        .map_or_else(|| format!("node.{}", node.index()), ToString::to_string);
    let (t, r, s) = node.transform().decomposed();
    tree.insert(
        node.index(),
        NodeInfo {
            name,
            parent,
            translation: t.into(),
            rotation: r.into(),
            scale: s.into(),
        },
    );
}

/// Builds the skeleton from the only skin. Also returns the mapping from
/// node index to original joint index.
/// Combined transform of the non-joint nodes above a root joint
fn root_offset(
    full_tree: &HashMap<usize, NodeInfo>,
    node_to_joint: &HashMap<usize, usize>,
    root: &NodeInfo,
    convert: Convert,
) -> Result<glm::Mat4, ArmError> {
    let mut offset = glm::Mat4::identity();
    let mut next = root.parent;
    while let Some(index) = next {
        let Some(node) = full_tree.get(&index) else {
            error!("no node info for ancestor {} of {}", index, root.name);
            return Err(ImportError::NoNodeInfo(index).into());
        };
        if node_to_joint.contains_key(&index) {
            warn!(
                "joint {} is below non-joint nodes inside joint {}",
                root.name, node.name
            );
        }
        offset = util::compose(
            &convert.position(&node.translation),
            &convert.rotation(&node.rotation),
            &convert.scale(&node.scale),
        ) * offset;
        next = node.parent;
    }
    if root.parent.is_some() {
        debug!("joint {} has non-joint parent, offset={:?}", root.name, offset);
    }
    Ok(offset)
}

fn load_skeleton(
    document: &Document,
    buffers: &[Data],
    options: &ImportOptions,
) -> Result<(Skeleton, HashMap<usize, usize>), ArmError> {
    let convert = Convert::new(options);
    let skins: Vec<_> = document.skins().collect();
    let skin = match skins.as_slice() {
        [] => {
            error!("no skin found");
            return Err(ImportError::NoSkin.into());
        }
        [skin] => skin,
        _ => {
            error!("{} skins found but only one is supported", skins.len());
            return Err(ImportError::MultipleSkins(skins.len()).into());
        }
    };

    // Full node tree
    let mut full_tree = HashMap::<usize, NodeInfo>::new();
    for scene in document.scenes() {
        for node in scene.nodes() {
            traverse_tree(&node, &mut full_tree, None);
        }
    }
    debug!("full tree={:?}", full_tree);

    let node_to_joint: HashMap<usize, usize> = skin
        .joints()
        .enumerate()
        .map(|(joint, node)| (node.index(), joint))
        .collect();
    let joint_count = skin.joints().count();

    let inverse_binds: Option<Vec<glm::Mat4>> = if options.file_inverse_bind {
        let reader = skin.reader(|x| buffers.get(x.index()).map(|d| &d.0[..]));
        let Some(iter) = reader.read_inverse_bind_matrices() else {
            error!("skin {} has no inverse bind matrices", skin.index());
            return Err(ImportError::NoInverseBind.into());
        };
        let matrices: Vec<glm::Mat4> = iter
            .map(|m| convert.matrix(&glm::Mat4::from(m)))
            .collect();
        if matrices.len() != joint_count {
            error!(
                "skin {} has {} joints but {} inverse binds",
                skin.index(),
                joint_count,
                matrices.len()
            );
            return Err(ImportError::InverseBindCount {
                joints: joint_count,
                matrices: matrices.len(),
            }
            .into());
        }
        Some(matrices)
    } else {
        None
    };

    let name = skin.name().map_or_else(
        || format!("skin.{}", skin.index()),
        ToString::to_string,
    );
    let mut builder = SkeletonBuilder::new(name);
    for (joint, node) in skin.joints().enumerate() {
        let node_index = node.index();
        let Some(node_info) = full_tree.get(&node_index) else {
            error!(
                "skin {} has no node info for node index {}",
                skin.index(),
                node_index,
            );
            return Err(ImportError::NoNodeInfo(node_index).into());
        };

        // A parent that is not a joint is dropped and this joint becomes a
        // root placed under the transforms of its ancestor nodes
        let parent = node_info
            .parent
            .and_then(|p| node_to_joint.get(&p).copied());

        let mut desc = JointDesc::new(node_info.name.clone(), parent)
            .translation(convert.position(&node_info.translation))
            .rotation(convert.rotation(&node_info.rotation))
            .scale(convert.scale(&node_info.scale));
        if parent.is_none() {
            let offset = root_offset(
                &full_tree,
                &node_to_joint,
                node_info,
                convert,
            )?;
            desc = desc.root_offset(offset);
        }
        if let Some(m) = inverse_binds.as_ref().and_then(|v| v.get(joint)) {
            desc = desc.inverse_bind(*m);
        }
        builder.push(desc);
    }
    Ok((builder.build()?, node_to_joint))
}

/// Collects a channel's keyframe times
fn read_times(inputs: Option<Iter<'_, f32>>) -> Result<Vec<f32>, ArmError> {
    match inputs {
        Some(Iter::Standard(times)) => Ok(times.collect()),
        Some(Iter::Sparse(_)) => {
            error!("unsupported sparse animation format");
            Err(ImportError::SparseAnimation.into())
        }
        None => {
            error!("animation does not contain a sampler");
            Err(ImportError::NoSampler.into())
        }
    }
}

/// Cubic spline outputs are stored as in-tangent, value, out-tangent
/// triplets. Only the values are kept.
fn spline_values<T: Copy>(values: Vec<T>, cubic: bool) -> Vec<T> {
    if cubic {
        values.chunks_exact(3).map(|c| c[1]).collect()
    } else {
        values
    }
}

fn load_animations(
    document: &Document,
    buffers: &[Data],
    skeleton: &Skeleton,
    node_to_joint: &HashMap<usize, usize>,
    options: &ImportOptions,
) -> Result<Vec<Animation>, ArmError> {
    let convert = Convert::new(options);
    let mut ret = Vec::new();
    for animation in document.animations() {
        let name = animation.name().map_or_else(
            || format!("animation.{}", animation.index()),
            ToString::to_string,
        );
        debug!("animation name={}", name);

        let mut input: Option<usize> = None;
        let mut clip = ClipBuilder::new(name.clone()).fill_bind_pose();
        for channel in animation.channels() {
            let sampler = channel.sampler();
            let accessor = sampler.input().index();
            if options.single_input && input.is_some_and(|i| i != accessor) {
                error!("animation {} has multiple inputs", name);
                return Err(ImportError::MultipleInputs(name).into());
            }
            input = Some(accessor);

            let node = channel.target().node();
            let Some(joint) = node_to_joint
                .get(&node.index())
                .and_then(|j| skeleton.by_original(*j))
                .map(|j| j.name.as_str())
            else {
                warn!(
                    "animation {} targets node {} which is not a joint",
                    name,
                    node.index()
                );
                continue;
            };

            let (interpolation, cubic) = match sampler.interpolation() {
                gltf::animation::Interpolation::Step => {
                    (Interpolation::Step, false)
                }
                gltf::animation::Interpolation::Linear => {
                    (Interpolation::Linear, false)
                }
                gltf::animation::Interpolation::CubicSpline => {
                    warn!("animation {} cubic spline played as linear", name);
                    (Interpolation::Linear, true)
                }
            };

            let reader =
                channel.reader(|x| buffers.get(x.index()).map(|d| &d.0[..]));
            let times = read_times(reader.read_inputs())?;
            let Some(outputs) = reader.read_outputs() else {
                error!("animation {} has a sampler with no output", name);
                return Err(ImportError::NoSampler.into());
            };
            clip = match outputs {
                ReadOutputs::Rotations(x) => {
                    let q: Vec<glm::Quat> = x
                        .into_f32()
                        .map(|r| convert.rotation(&r.into()))
                        .collect();
                    let q = spline_values(q, cubic);
                    clip.rotation(joint, Channel::new(interpolation, times, q)?)
                }
                ReadOutputs::Translations(x) => {
                    let v: Vec<glm::Vec3> =
                        x.map(|t| convert.position(&t.into())).collect();
                    let v = spline_values(v, cubic);
                    clip.translation(
                        joint,
                        Channel::new(interpolation, times, v)?,
                    )
                }
                ReadOutputs::Scales(x) => {
                    let v: Vec<glm::Vec3> =
                        x.map(|s| convert.scale(&s.into())).collect();
                    let v = spline_values(v, cubic);
                    clip.scale(joint, Channel::new(interpolation, times, v)?)
                }
                ReadOutputs::MorphTargetWeights(_) => {
                    error!("morphing not supported");
                    return Err(ImportError::Morphing.into());
                }
            };
        }
        ret.push(clip.build(skeleton)?);
    }
    Ok(ret)
}
