mod common;

use std::collections::BTreeMap;

use common::*;
use mdl_model::ModelRoot;
use pretty_assertions::assert_eq;

fn textured_model(textures: Vec<TestTexture>, skin_families: Vec<Vec<u16>>) -> TestModel {
    TestModel {
        name: "textured",
        bones: vec![TestBone::root()],
        textures,
        skin_families,
        positions: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        normals: vec![[0.0, 0.0, 1.0]],
        meshes: vec![TestMesh {
            skin_ref: 0,
            runs: vec![Run::Strip(vec![
                [0, 0, 0, 0],
                [1, 0, 8, 0],
                [2, 0, 0, 8],
            ])],
        }],
        ..Default::default()
    }
}

#[test]
fn decode_masked_texture() {
    let texture = TestTexture {
        name: "chrome.bmp",
        flags: 0x40,
        width: 2,
        height: 2,
        indices: vec![0, 1, 255, 3],
        palette: gray_palette(),
    };
    let model = textured_model(vec![texture], vec![vec![0]]);

    let root = ModelRoot::from_bytes(&model.to_bytes(), None, &BTreeMap::new()).unwrap();
    assert_eq!(1, root.textures.len());

    let texture = &root.textures[0];
    assert_eq!("chrome.bmp", texture.name);
    assert_eq!(2, texture.width);
    assert_eq!(2, texture.height);
    assert!(texture.flags.masked());
    assert_eq!(
        vec![0, 0, 0, 255, 1, 1, 1, 255, 0, 0, 0, 0, 3, 3, 3, 255],
        texture.image_data
    );
}

#[test]
fn decode_unmasked_index_255() {
    let texture = TestTexture {
        indices: vec![255, 255],
        width: 2,
        height: 1,
        ..TestTexture::solid("opaque.bmp", 2, 1, 0)
    };
    let model = textured_model(vec![texture], vec![vec![0]]);

    let root = ModelRoot::from_bytes(&model.to_bytes(), None, &BTreeMap::new()).unwrap();
    assert_eq!(vec![255; 8], root.textures[0].image_data);
}

#[test]
fn skin_families_remap_failed_textures() {
    let textures = vec![
        TestTexture::solid("a.bmp", 8, 8, 1),
        TestTexture::solid("b.bmp", 16, 16, 2),
        TestTexture::solid("broken.bmp", 2, 2, 0),
    ];
    let model = textured_model(textures, vec![vec![2, 1], vec![0, 1]]);
    let mut bytes = model.to_bytes();
    // Move the broken texture past the end of the file.
    let descriptor_offset = u32::from_le_bytes(bytes[184..188].try_into().unwrap()) as usize;
    let data_offset = descriptor_offset + 2 * 80 + 76;
    let len = bytes.len() as u32;
    bytes[data_offset..data_offset + 4].copy_from_slice(&(len - 2).to_le_bytes());

    let root = ModelRoot::from_bytes(&bytes, None, &BTreeMap::new()).unwrap();
    assert_eq!(2, root.textures.len());
    assert_eq!("b.bmp", root.textures[1].name);
    assert_eq!(
        vec![vec![None, Some(1)], vec![Some(0), Some(1)]],
        root.skin_families
    );
    assert_eq!(Some(0), root.texture_index(1, 0));

    // Coordinates still use the dimensions from the descriptor.
    let model = &root.body_parts[0].models[0];
    assert_eq!(None, model.meshes[0].texture_index);
    assert_eq!(4.0, model.vertices[1].uv.x);
}

#[test]
fn external_texture_file() {
    let mut model = textured_model(Vec::new(), Vec::new());
    model.meshes[0].skin_ref = 0;
    let texture_file = TestModel {
        name: "texturedT",
        textures: vec![TestTexture::solid("skin.bmp", 16, 8, 7)],
        skin_families: vec![vec![0]],
        ..Default::default()
    };

    let root = ModelRoot::from_bytes(
        &model.to_bytes(),
        Some(texture_file.to_bytes().as_slice()),
        &BTreeMap::new(),
    )
    .unwrap();
    assert_eq!(1, root.textures.len());
    assert_eq!(&[7u8, 7, 7, 255], &root.textures[0].image_data[..4]);
    assert_eq!(vec![vec![Some(0)]], root.skin_families);

    let model = &root.body_parts[0].models[0];
    assert_eq!(Some(0), model.meshes[0].texture_index);
    assert_eq!(0.5, model.vertices[1].uv.x);
    assert_eq!(1.0, model.vertices[2].uv.y);
}

#[test]
fn embedded_textures_ignore_external_file() {
    let model = textured_model(vec![TestTexture::solid("a.bmp", 8, 8, 1)], vec![vec![0]]);
    let texture_file = TestModel {
        textures: vec![
            TestTexture::solid("b.bmp", 4, 4, 2),
            TestTexture::solid("c.bmp", 4, 4, 3),
        ],
        skin_families: vec![vec![0, 1]],
        ..Default::default()
    };

    let root = ModelRoot::from_bytes(
        &model.to_bytes(),
        Some(texture_file.to_bytes().as_slice()),
        &BTreeMap::new(),
    )
    .unwrap();
    assert_eq!(1, root.textures.len());
    assert_eq!("a.bmp", root.textures[0].name);
}

#[test]
fn invalid_external_texture_file() {
    let model = textured_model(Vec::new(), Vec::new());
    let mut texture_file = TestModel::default().to_bytes();
    texture_file[0] = b'X';

    let root =
        ModelRoot::from_bytes(&model.to_bytes(), Some(texture_file.as_slice()), &BTreeMap::new()).unwrap();
    assert!(root.textures.is_empty());
    assert_eq!(
        None,
        root.body_parts[0].models[0].meshes[0].texture_index
    );
}
