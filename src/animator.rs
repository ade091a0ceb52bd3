use crate::{
    animation::{Animation, AnimationTask, AnimationTrack, ClipState},
    arm_error::{ArmError, ContentError},
    config::CharacterConfig,
    import::Character,
    skeleton::Skeleton,
    skin::SkinningMatrices,
    types::{CharacterId, ClipId, JointRef, SkinId, TaskId},
};
use ahash::{HashMap, HashMapExt};
use log::{debug, error, info};
use nalgebra_glm as glm;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// A skeleton and the clips built against it. Shared by every character
/// spawned from it.
#[derive(Clone, Debug)]
pub struct CharacterSkin {
    skeleton: Skeleton,
    clips: Vec<Animation>,
    clip_names: HashMap<String, ClipId>,
}

impl CharacterSkin {
    #[must_use]
    pub const fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    #[must_use]
    pub fn clips(&self) -> &[Animation] {
        &self.clips
    }

    #[must_use]
    pub fn clip(&self, clip: ClipId) -> Option<&Animation> {
        self.clips.get(clip.0)
    }

    #[must_use]
    pub fn clip_id(&self, name: &str) -> Option<ClipId> {
        self.clip_names.get(name).copied()
    }
}

/// Registry of skins and live characters, and the per-frame driver API
///
/// Characters are referred to by an opaque `CharacterId` returned from
/// `spawn`. Each has its own `AnimationTrack`, so tracks can be played
/// independently.
#[derive(Debug, Default)]
pub struct Animator {
    skins: Vec<CharacterSkin>,
    tracks: HashMap<CharacterId, AnimationTrack>,
    next_character: u32,
}

fn get_skin(
    skins: &[CharacterSkin],
    skin: SkinId,
) -> Result<&CharacterSkin, ArmError> {
    skins.get(skin.0).ok_or_else(|| {
        error!("skin {} not found", skin.0);
        ArmError::UnknownSkin(skin.0)
    })
}

/// Checks that a clip fits a skeleton and does not reuse a clip name
fn check_clip(
    skeleton: &Skeleton,
    clip_names: &HashMap<String, ClipId>,
    animation: &Animation,
) -> Result<(), ArmError> {
    animation.covers(skeleton)?;
    if clip_names.contains_key(animation.name()) {
        error!(
            "skeleton {} already has a clip named {}",
            skeleton.name(),
            animation.name()
        );
        return Err(
            ContentError::DuplicateClipName(animation.name().to_string())
                .into(),
        );
    }
    Ok(())
}

fn get_track_mut(
    tracks: &mut HashMap<CharacterId, AnimationTrack>,
    character: CharacterId,
) -> Result<&mut AnimationTrack, ArmError> {
    tracks.get_mut(&character).ok_or_else(|| {
        error!("{} not found", character);
        ArmError::UnknownCharacter(character.0)
    })
}

impl Animator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            skins: Vec::new(),
            tracks: HashMap::new(),
            next_character: 0,
        }
    }

    /// Adds a skeleton with an empty clip store
    pub fn add_skin(&mut self, skeleton: Skeleton) -> SkinId {
        info!(
            "adding skin {} with {} joints",
            skeleton.name(),
            skeleton.joint_count()
        );
        self.skins.push(CharacterSkin {
            skeleton,
            clips: Vec::new(),
            clip_names: HashMap::new(),
        });
        SkinId(self.skins.len() - 1)
    }

    /// Adds an imported skeleton and all of its clips
    ///
    /// Every clip is checked before anything is added, so on error the
    /// animator is unchanged.
    ///
    /// # Errors
    /// Same as `add_clip`.
    pub fn add_character(
        &mut self,
        character: Character,
    ) -> Result<SkinId, ArmError> {
        let Character {
            skeleton,
            animations,
        } = character;
        let mut clip_names = HashMap::with_capacity(animations.len());
        for (index, animation) in animations.iter().enumerate() {
            check_clip(&skeleton, &clip_names, animation)?;
            clip_names.insert(animation.name().to_string(), ClipId(index));
        }
        info!(
            "adding skin {} with {} joints and {} clips",
            skeleton.name(),
            skeleton.joint_count(),
            animations.len()
        );
        self.skins.push(CharacterSkin {
            skeleton,
            clips: animations,
            clip_names,
        });
        Ok(SkinId(self.skins.len() - 1))
    }

    /// Adds a clip to a skin's clip store
    ///
    /// # Errors
    /// Returns `ArmError::UnknownSkin`, `ArmError::MissingChannel` if a joint
    /// of the skeleton has no frame, `ContentError::SkeletonMismatch` if the
    /// clip was built for another skeleton, or
    /// `ContentError::DuplicateClipName`.
    pub fn add_clip(
        &mut self,
        skin: SkinId,
        animation: Animation,
    ) -> Result<ClipId, ArmError> {
        let Some(store) = self.skins.get_mut(skin.0) else {
            error!("skin {} not found", skin.0);
            return Err(ArmError::UnknownSkin(skin.0));
        };
        check_clip(&store.skeleton, &store.clip_names, &animation)?;
        let id = ClipId(store.clips.len());
        debug!("skin {} clip {} is {}", skin.0, id.0, animation.name());
        store.clip_names.insert(animation.name().to_string(), id);
        store.clips.push(animation);
        Ok(id)
    }

    #[must_use]
    pub fn skin(&self, skin: SkinId) -> Option<&CharacterSkin> {
        self.skins.get(skin.0)
    }

    /// Finds a clip by name
    ///
    /// # Errors
    /// Returns `ArmError::UnknownSkin` or `ArmError::UnknownClipName`.
    pub fn clip_id(
        &self,
        skin: SkinId,
        name: &str,
    ) -> Result<ClipId, ArmError> {
        get_skin(&self.skins, skin)?.clip_id(name).ok_or_else(|| {
            error!("skin {} has no clip {}", skin.0, name);
            ArmError::UnknownClipName(name.to_string())
        })
    }

    /// Creates a character using a skin
    ///
    /// # Errors
    /// Returns `ArmError::UnknownSkin`, or `ArmError::CharacterIdsExhausted`
    /// once every id has been handed out.
    pub fn spawn(&mut self, skin: SkinId) -> Result<CharacterId, ArmError> {
        let joint_count = get_skin(&self.skins, skin)?.skeleton.joint_count();
        let Some(next) = self.next_character.checked_add(1) else {
            error!("no character ids left");
            return Err(ArmError::CharacterIdsExhausted);
        };
        let character = CharacterId(self.next_character);
        self.next_character = next;
        self.tracks.insert(
            character,
            AnimationTrack::new(character, skin, joint_count),
        );
        debug!("spawned {} with skin {}", character, skin.0);
        Ok(character)
    }

    /// Removes a character
    ///
    /// # Errors
    /// Returns `ArmError::UnknownCharacter`.
    pub fn despawn(&mut self, character: CharacterId) -> Result<(), ArmError> {
        if self.tracks.remove(&character).is_none() {
            error!("{} not found", character);
            return Err(ArmError::UnknownCharacter(character.0));
        }
        debug!("despawned {}", character);
        Ok(())
    }

    #[must_use]
    pub fn track(&self, character: CharacterId) -> Option<&AnimationTrack> {
        self.tracks.get(&character)
    }

    #[must_use]
    pub fn character_count(&self) -> usize {
        self.tracks.len()
    }

    /// Adds a task to a character. Each clip's duration is filled in from
    /// the clip store.
    ///
    /// # Errors
    /// Returns `ArmError::UnknownCharacter`, `ArmError::UnknownSkin` or
    /// `ArmError::UnknownClip`.
    pub fn add_task(
        &mut self,
        character: CharacterId,
        mut task: AnimationTask,
    ) -> Result<TaskId, ArmError> {
        let track = get_track_mut(&mut self.tracks, character)?;
        let skin = get_skin(&self.skins, track.skin())?;
        for state in task.stack_mut() {
            let Some(clip) = skin.clip(state.clip) else {
                error!("{} task uses unknown clip {}", character, state.clip.0);
                return Err(ArmError::UnknownClip(state.clip.0));
            };
            state.max_duration = clip.duration();
        }
        Ok(track.add_task(task))
    }

    /// Adds every task in a configuration, resolving clip names
    ///
    /// # Errors
    /// Returns `ArmError::UnknownClipName` for a clip not in the skin and any
    /// error from `add_task`.
    pub fn add_tasks_from_config(
        &mut self,
        character: CharacterId,
        config: &CharacterConfig,
    ) -> Result<Vec<TaskId>, ArmError> {
        let skin = self
            .tracks
            .get(&character)
            .map(AnimationTrack::skin)
            .ok_or_else(|| {
                error!("{} not found", character);
                ArmError::UnknownCharacter(character.0)
            })?;
        let mut ids = Vec::with_capacity(config.tasks.len());
        for task_config in &config.tasks {
            let stack = task_config
                .clips
                .iter()
                .map(|c| {
                    Ok(ClipState::new(self.clip_id(skin, &c.clip)?)
                        .at(c.x, c.y)
                        .speed(c.speed))
                })
                .collect::<Result<Vec<_>, ArmError>>()?;
            let task = AnimationTask::new(stack, task_config.mode)?
                .looping(task_config.looping);
            ids.push(self.add_task(character, task)?);
        }
        Ok(ids)
    }

    /// Advances one task of one character by `dt` and evaluates its pose.
    /// `x` and `y` are the blend coordinates.
    ///
    /// # Errors
    /// Returns `ArmError::UnknownCharacter`, `ArmError::UnknownTask` or any
    /// error from evaluating the pose. The character's pose can not be
    /// exported after an error.
    pub fn play(
        &mut self,
        character: CharacterId,
        task: TaskId,
        x: f32,
        y: f32,
        dt: f32,
    ) -> Result<(), ArmError> {
        let track = get_track_mut(&mut self.tracks, character)?;
        let skin = get_skin(&self.skins, track.skin())?;
        track.play(&skin.skeleton, &skin.clips, task, x, y, dt)
    }

    /// Sets the task played by `tick`. `None` holds the bind pose.
    ///
    /// # Errors
    /// Returns `ArmError::UnknownCharacter` or `ArmError::UnknownTask`.
    pub fn set_active(
        &mut self,
        character: CharacterId,
        task: Option<TaskId>,
        x: f32,
        y: f32,
    ) -> Result<(), ArmError> {
        let track = get_track_mut(&mut self.tracks, character)?;
        if let Some(t) = task {
            if track.task(t).is_none() {
                error!("{} has no task {}", character, t.0);
                return Err(ArmError::UnknownTask(t.0));
            }
        }
        track.set_active(task, x, y);
        Ok(())
    }

    /// Plays the active task of every character. Characters without one are
    /// put in the bind pose.
    ///
    /// # Errors
    /// Returns the first error from any character.
    pub fn tick(&mut self, dt: f32) -> Result<(), ArmError> {
        let skins = &self.skins;

        #[cfg(feature = "rayon")]
        let it = self.tracks.par_iter_mut();
        #[cfg(not(feature = "rayon"))]
        let mut it = self.tracks.iter_mut();
        it.try_for_each(|(_, track)| {
            let skin = get_skin(skins, track.skin())?;
            track.tick(&skin.skeleton, &skin.clips, dt)
        })
    }

    /// Calculates the skinning matrices for a character's current pose,
    /// indexed by original joint index
    ///
    /// # Errors
    /// Returns `ArmError::UnknownCharacter` or `ArmError::PoseNotReady` if
    /// the last evaluation failed.
    pub fn export_to_render(
        &mut self,
        character: CharacterId,
    ) -> Result<&SkinningMatrices, ArmError> {
        let track = get_track_mut(&mut self.tracks, character)?;
        let skin = get_skin(&self.skins, track.skin())?;
        track.export(&skin.skeleton)
    }

    /// Gets the joint to model space matrix of one joint in a character's
    /// current pose, for attaching objects to it
    ///
    /// # Errors
    /// Returns `ArmError::UnknownCharacter`, `ArmError::UnknownJoint`,
    /// `ArmError::JointIndexOutOfRange` or `ArmError::PoseNotReady`.
    pub fn bone_location(
        &self,
        character: CharacterId,
        joint: impl Into<JointRef>,
    ) -> Result<glm::Mat4, ArmError> {
        let Some(track) = self.tracks.get(&character) else {
            error!("{} not found", character);
            return Err(ArmError::UnknownCharacter(character.0));
        };
        let skin = get_skin(&self.skins, track.skin())?;
        track.bone_location(&skin.skeleton, &joint.into())
    }
}
