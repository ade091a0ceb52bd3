//! Tests for loading characters from glTF
//!
//! The test document has two joints. The skin lists the spine before the
//! hips, so the original joint order is the reverse of the hierarchy order.
//! Buffer data is embedded as base64:
//! - 2 key times, 0 and 1
//! - 2 spine rotations, identity then a quarter turn about Z
//! - 2 hips translations, (0, 1, 0) then (1, 1, 0)
//! - 2 inverse bind matrices for the spine and hips

use armature::{
    animation::{pose, AnimationTask},
    import::{gltf_file, ImportError, ImportOptions},
    skin, util, Animator, ArmError, SkinningMatrices,
};
use log::info;
use nalgebra_glm as glm;
use std::sync::Once;

const EPSILON: f32 = 0.0005f32; // Small value for float comparisons
static INIT: Once = Once::new();

fn init_tests() {
    INIT.call_once(|| {
        env_logger::init();
    });
}

const RIG: &str = r#"{
  "asset": { "version": "2.0" },
  "scene": 0,
  "scenes": [ { "nodes": [0] } ],
  "nodes": [
    { "name": "hips", "translation": [0.0, 1.0, 0.0], "children": [1] },
    { "name": "spine", "translation": [0.0, 0.5, 0.0] }
  ],
  "skins": [ { "name": "rig", "joints": [1, 0], "inverseBindMatrices": 3 } ],
  "animations": [
    {
      "name": "bend",
      "channels": [
        { "sampler": 0, "target": { "node": 1, "path": "rotation" } },
        { "sampler": 1, "target": { "node": 0, "path": "translation" } }
      ],
      "samplers": [
        { "input": 0, "output": 1, "interpolation": "LINEAR" },
        { "input": 0, "output": 2, "interpolation": "LINEAR" }
      ]
    }
  ],
  "accessors": [
    { "bufferView": 0, "componentType": 5126, "count": 2, "type": "SCALAR",
      "min": [0.0], "max": [1.0] },
    { "bufferView": 1, "componentType": 5126, "count": 2, "type": "VEC4" },
    { "bufferView": 2, "componentType": 5126, "count": 2, "type": "VEC3" },
    { "bufferView": 3, "componentType": 5126, "count": 2, "type": "MAT4" },
    { "bufferView": 0, "componentType": 5126, "count": 2, "type": "SCALAR",
      "min": [0.0], "max": [1.0] }
  ],
  "bufferViews": [
    { "buffer": 0, "byteOffset": 0, "byteLength": 8 },
    { "buffer": 0, "byteOffset": 8, "byteLength": 32 },
    { "buffer": 0, "byteOffset": 40, "byteLength": 24 },
    { "buffer": 0, "byteOffset": 64, "byteLength": 128 }
  ],
  "buffers": [
    {
      "byteLength": 192,
      "uri": "data:application/octet-stream;base64,AAAAAAAAgD8AAAAAAAAAAAAAAAAAAIA/AAAAAAAAAADzBDU/8wQ1PwAAAAAAAIA/AAAAAAAAgD8AAIA/AAAAAAAAgD8AAAAAAAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAAAAAAAAAAAAAIA/AAAAAAAAAAAAAMC/AAAAAAAAgD8AAIA/AAAAAAAAAAAAAAAAAAAAAAAAgD8AAAAAAAAAAAAAAAAAAAAAAACAPwAAAAAAAAAAAACAvwAAAAAAAIA/"
    }
  ]
}"#;

const SKIN: &str = concat!(
    r#""skins": [ { "name": "rig", "joints": [1, 0], "#,
    r#""inverseBindMatrices": 3 } ],"#
);

fn vec_eq(a: &glm::Vec3, b: &glm::Vec3) -> bool {
    let c = glm::equal_eps(a, b, EPSILON);
    c.x && c.y && c.z
}

#[test]
fn joint_order() {
    init_tests();
    let character =
        gltf_file::load_slice(RIG.as_bytes(), &ImportOptions::default())
            .unwrap();
    let skeleton = &character.skeleton;
    assert_eq!(skeleton.name(), "rig");
    assert_eq!(skeleton.joint_count(), 2);
    assert_eq!(skeleton.joints()[0].name, "hips");
    assert_eq!(skeleton.joints()[1].name, "spine");
    assert_eq!(skeleton.by_original(0).unwrap().name, "spine");
    assert_eq!(skeleton.by_original(1).unwrap().name, "hips");
    assert_eq!(skeleton.roots(), &[0]);

    assert_eq!(character.animations.len(), 1);
    let clip = &character.animations[0];
    assert_eq!(clip.name(), "bend");
    assert!((clip.duration() - 1.0).abs() < EPSILON);
    assert!(clip.covers(skeleton).is_ok());
}

#[test]
fn play_imported() {
    init_tests();
    let character =
        gltf_file::load_slice(RIG.as_bytes(), &ImportOptions::default())
            .unwrap();
    let mut animator = Animator::new();
    let skin = animator.add_character(character).unwrap();
    let c = animator.spawn(skin).unwrap();
    let bend = animator.clip_id(skin, "bend").unwrap();
    let task = animator
        .add_task(c, AnimationTask::clip(bend, 0.0).looping(false))
        .unwrap();

    // Clamped at the last keys
    animator.play(c, task, 0.0, 0.0, 5.0).unwrap();
    let hips = animator.bone_location(c, "hips").unwrap();
    let spine = animator.bone_location(c, 0usize).unwrap();
    assert!(vec_eq(&util::translation_of(&hips), &glm::vec3(1.0, 1.0, 0.0)));
    assert!(vec_eq(&util::translation_of(&spine), &glm::vec3(1.0, 1.5, 0.0)));

    // The spine's local Y axis now points along -X
    let y = spine * glm::vec4(0.0, 1.0, 0.0, 0.0);
    info!("spine y axis {:?}", y);
    assert!(vec_eq(&y.xyz(), &glm::vec3(-1.0, 0.0, 0.0)));
}

#[test]
fn file_inverse_bind_matches_computed() {
    init_tests();
    let computed =
        gltf_file::load_slice(RIG.as_bytes(), &ImportOptions::default())
            .unwrap();
    let options = ImportOptions {
        file_inverse_bind: true,
        ..ImportOptions::default()
    };
    let from_file = gltf_file::load_slice(RIG.as_bytes(), &options).unwrap();
    for (a, b) in computed
        .skeleton
        .joints()
        .iter()
        .zip(from_file.skeleton.joints())
    {
        let c =
            glm::equal_columns_eps(&a.inverse_bind, &b.inverse_bind, EPSILON);
        assert!(c.x && c.y && c.z && c.w, "{}", a.name);
    }
}

#[test]
fn swizzle_and_scale() {
    init_tests();
    let options = ImportOptions {
        swizzle: true,
        scale: 2.0,
        file_inverse_bind: true,
        ..ImportOptions::default()
    };
    let character = gltf_file::load_slice(RIG.as_bytes(), &options).unwrap();
    let skeleton = &character.skeleton;
    let mut world = SkinningMatrices::new();
    pose::bind_pose(skeleton, &mut world).unwrap();

    // Y up becomes Z up
    let spine = util::translation_of(world.get(0).unwrap());
    assert!(vec_eq(&spine, &glm::vec3(0.0, 0.0, 3.0)));

    // Inverse binds from the file are converted the same way
    for joint in skeleton.joints() {
        let m = world.get(joint.original_index).unwrap() * joint.inverse_bind;
        let c = glm::equal_columns_eps(&m, &glm::Mat4::identity(), EPSILON);
        assert!(c.x && c.y && c.z && c.w, "{}", joint.name);
    }
}

#[test]
fn placed_under_armature_node() {
    init_tests();
    let placed = RIG
        .replace(
            r#""scenes": [ { "nodes": [0] } ]"#,
            r#""scenes": [ { "nodes": [2] } ]"#,
        )
        .replace(
            r#"{ "name": "spine", "translation": [0.0, 0.5, 0.0] }"#,
            concat!(
                r#"{ "name": "spine", "translation": [0.0, 0.5, 0.0] },"#,
                r#"{ "name": "Armature", "translation": [5.0, 0.0, 0.0], "#,
                r#""scale": [2.0, 2.0, 2.0], "children": [0] }"#
            ),
        );
    let character =
        gltf_file::load_slice(placed.as_bytes(), &ImportOptions::default())
            .unwrap();
    assert_eq!(character.skeleton.joint_count(), 2);

    let mut world = SkinningMatrices::new();
    pose::bind_pose(&character.skeleton, &mut world).unwrap();
    let mut palette = SkinningMatrices::new();
    skin::export(&character.skeleton, &world, &mut palette).unwrap();
    for m in palette.as_slice() {
        let c = glm::equal_columns_eps(m, &glm::Mat4::identity(), EPSILON);
        assert!(c.x && c.y && c.z && c.w);
    }

    let mut animator = Animator::new();
    let skin = animator.add_character(character).unwrap();
    let c = animator.spawn(skin).unwrap();
    let bend = animator.clip_id(skin, "bend").unwrap();
    let task = animator
        .add_task(c, AnimationTask::clip(bend, 0.0).looping(false))
        .unwrap();
    animator.play(c, task, 0.0, 0.0, 5.0).unwrap();
    let hips = animator.bone_location(c, "hips").unwrap();
    let spine = animator.bone_location(c, "spine").unwrap();
    assert!(vec_eq(&util::translation_of(&hips), &glm::vec3(7.0, 2.0, 0.0)));
    assert!(vec_eq(&util::translation_of(&spine), &glm::vec3(7.0, 3.0, 0.0)));
}

#[test]
fn load_from_file() {
    init_tests();
    let path = std::env::temp_dir().join("armature_rig.gltf");
    std::fs::write(&path, RIG).unwrap();
    let character =
        gltf_file::load(&path, &ImportOptions::default()).unwrap();
    assert_eq!(character.skeleton.joint_count(), 2);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn skin_count() {
    init_tests();
    let none = RIG.replace(SKIN, "");
    assert!(matches!(
        gltf_file::load_slice(none.as_bytes(), &ImportOptions::default()),
        Err(ArmError::ImportError(ImportError::NoSkin))
    ));

    let two = RIG.replace(
        SKIN,
        r#""skins": [ { "joints": [0] }, { "joints": [1] } ],"#,
    );
    assert!(matches!(
        gltf_file::load_slice(two.as_bytes(), &ImportOptions::default()),
        Err(ArmError::ImportError(ImportError::MultipleSkins(2)))
    ));
}

#[test]
fn single_input() {
    init_tests();
    let split = RIG.replace(
        r#"{ "input": 0, "output": 2"#,
        r#"{ "input": 4, "output": 2"#,
    );
    assert!(matches!(
        gltf_file::load_slice(split.as_bytes(), &ImportOptions::default()),
        Err(ArmError::ImportError(ImportError::MultipleInputs(_)))
    ));

    let options = ImportOptions {
        single_input: false,
        ..ImportOptions::default()
    };
    assert!(gltf_file::load_slice(split.as_bytes(), &options).is_ok());
}

#[test]
fn missing_file() {
    let r = gltf_file::load(
        std::path::Path::new("no/such/rig.gltf"),
        &ImportOptions::default(),
    );
    assert!(matches!(r, Err(ArmError::StdIoError(_))));
}
