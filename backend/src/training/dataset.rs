use std::fs;
use std::path::{Path, PathBuf};

use tch::Tensor;

use super::TrainError;
use crate::inference::{rgb_pixels, CHANNELS};

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "ppm", "tif", "tiff"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub path: PathBuf,
    pub class_index: usize,
}

/// Labeled images laid out as `<root>/<class>/**/<image>`.
#[derive(Debug, Clone)]
pub struct ImageFolder {
    root: PathBuf,
    classes: Vec<String>,
    samples: Vec<Sample>,
}

impl ImageFolder {
    /// Classes are the sub-directory names of `root`, sorted.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, TrainError> {
        let root = root.as_ref();
        let classes = class_dirs(root)?;
        Self::with_classes(root, classes.clone(), &classes)
    }

    /// Reuses an existing class order, e.g. the training set's for validation.
    pub fn open_with_classes(root: impl AsRef<Path>, classes: &[String]) -> Result<Self, TrainError> {
        let root = root.as_ref();
        let present = class_dirs(root)?;
        if let Some(unknown) = present.iter().find(|name| !classes.contains(name)) {
            return Err(TrainError::UnknownClass(unknown.clone()));
        }
        Self::with_classes(root, classes.to_vec(), &present)
    }

    fn with_classes(root: &Path, classes: Vec<String>, present: &[String]) -> Result<Self, TrainError> {
        let mut samples = Vec::new();
        for (class_index, class) in classes.iter().enumerate() {
            if !present.contains(class) {
                continue;
            }
            let mut files = Vec::new();
            collect_images(&root.join(class), &mut files)?;
            files.sort();
            samples.extend(files.into_iter().map(|path| Sample { path, class_index }));
        }

        if samples.is_empty() {
            return Err(TrainError::NoSamples(root.to_path_buf()));
        }

        Ok(Self {
            root: root.to_path_buf(),
            classes,
            samples,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Decodes the selected samples into an NHWC float batch and an i64 label vector.
    pub fn load_batch(&self, indices: &[usize], image_size: u32) -> Result<(Tensor, Tensor), TrainError> {
        let side = image_size as usize;
        let mut pixels = Vec::with_capacity(indices.len() * side * side * CHANNELS);
        let mut labels = Vec::with_capacity(indices.len());

        for &index in indices {
            let sample = &self.samples[index];
            let image = image::open(&sample.path)?;
            pixels.extend(rgb_pixels(&image, image_size));
            labels.push(sample.class_index as i64);
        }

        let images = Tensor::from_slice(&pixels).reshape([
            indices.len() as i64,
            side as i64,
            side as i64,
            CHANNELS as i64,
        ]);
        Ok((images, Tensor::from_slice(&labels)))
    }
}

fn class_dirs(root: &Path) -> Result<Vec<String>, TrainError> {
    let mut classes = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            classes.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    classes.sort();
    Ok(classes)
}

fn collect_images(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), TrainError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_images(&path, out)?;
        } else if is_image(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tch::Kind;

    fn write_image(path: &Path, color: [u8; 3]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(12, 8, Rgb(color)).save(path).unwrap();
    }

    fn sample_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write_image(&dir.path().join("B/b_1.png"), [0, 0, 255]);
        write_image(&dir.path().join("A/a_2.png"), [255, 0, 0]);
        write_image(&dir.path().join("A/nested/a_1.jpg"), [255, 0, 0]);
        fs::write(dir.path().join("A/notes.txt"), "not an image").unwrap();
        fs::write(dir.path().join("README"), "top-level file").unwrap();
        dir
    }

    #[test]
    fn classes_are_sorted_directory_names() {
        let dir = sample_tree();
        let folder = ImageFolder::open(dir.path()).unwrap();
        assert_eq!(folder.classes(), ["A", "B"]);
        assert_eq!(folder.len(), 3);
        let per_class: Vec<usize> = folder.samples().iter().map(|s| s.class_index).collect();
        assert_eq!(per_class, [0, 0, 1]);
    }

    #[test]
    fn extensions_match_case_insensitively() {
        assert!(is_image(Path::new("x/A_4.JPG")));
        assert!(is_image(Path::new("scan.tiff")));
        assert!(!is_image(Path::new("labels.txt")));
        assert!(!is_image(Path::new("no_extension")));
    }

    #[test]
    fn validation_reuses_training_order() {
        let dir = tempfile::tempdir().unwrap();
        write_image(&dir.path().join("C/c.png"), [1, 2, 3]);
        let classes = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let folder = ImageFolder::open_with_classes(dir.path(), &classes).unwrap();
        assert_eq!(folder.classes(), classes.as_slice());
        assert_eq!(folder.samples()[0].class_index, 2);
    }

    #[test]
    fn unknown_validation_class_is_rejected() {
        let dir = sample_tree();
        let err = ImageFolder::open_with_classes(dir.path(), &["A".to_string()]).unwrap_err();
        assert!(matches!(err, TrainError::UnknownClass(name) if name == "B"));
    }

    #[test]
    fn empty_tree_has_no_samples() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("A")).unwrap();
        assert!(matches!(ImageFolder::open(dir.path()), Err(TrainError::NoSamples(_))));
    }

    #[test]
    fn load_batch_builds_nhwc_tensor() {
        let dir = sample_tree();
        let folder = ImageFolder::open(dir.path()).unwrap();
        let (images, labels) = folder.load_batch(&[2, 0], 16).unwrap();
        assert_eq!(images.size(), [2, 16, 16, 3]);
        assert_eq!(images.kind(), Kind::Float);
        assert_eq!(Vec::<i64>::try_from(&labels).unwrap(), [1, 0]);
        // The class B sample is pure blue.
        assert_eq!(images.double_value(&[0, 5, 5, 2]), 1.0);
        assert_eq!(images.double_value(&[0, 5, 5, 0]), 0.0);
    }
}
