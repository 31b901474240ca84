use hetero_parity::HarnessError;
use hetero_parity::config::HarnessConfig;
use hetero_parity::harness::{run_image, run_matmul};
use hetero_parity::matrix::{ImageFrame, Matrix};
use hetero_parity::ops::cpu;
use hetero_parity::ops::dispatch::{self, Executor};
use hetero_parity::ops::wgpu::device::{DeviceInventory, DeviceRequest};
use hetero_parity::ops::wgpu::signature::{BLEND_ENTRY, KernelSource, MATMUL_ENTRY};
use hetero_parity::verify::{self, Verdict};

#[test]
fn test_reference_two_by_two() {
    let a = Matrix::new(2, vec![1, 2, 3, 4]).unwrap();
    let b = Matrix::new(2, vec![5, 6, 7, 8]).unwrap();
    let c = cpu::matmul(&a, &b).unwrap();
    assert_eq!(c.as_slice(), &[19, 22, 43, 50]);
}

#[test]
fn test_reference_one_by_one() {
    let a = Matrix::new(1, vec![7]).unwrap();
    let b = Matrix::new(1, vec![3]).unwrap();
    assert_eq!(cpu::matmul(&a, &b).unwrap().as_slice(), &[21]);
}

#[test]
fn test_mismatched_sizes_fail_fast() {
    let a = Matrix::identity(2).unwrap();
    let b = Matrix::identity(3).unwrap();
    assert!(matches!(
        cpu::matmul(&a, &b),
        Err(HarnessError::DimensionMismatch(_))
    ));
    assert!(matches!(
        dispatch::matmul(&Executor::Cpu { parallel: true }, &a, &b),
        Err(HarnessError::DimensionMismatch(_))
    ));
}

#[test]
fn test_matrix_rejects_bad_length() {
    assert!(Matrix::new(2, vec![1, 2, 3]).is_err());
    assert!(Matrix::new(0, vec![]).is_err());
}

#[test]
fn test_checker_against_reference() {
    let a = Matrix::new(2, vec![1, 2, 3, 4]).unwrap();
    let b = Matrix::new(2, vec![5, 6, 7, 8]).unwrap();
    let c = cpu::matmul(&a, &b).unwrap();
    assert!(verify::compare(c.as_slice(), &[19, 22, 43, 50]).is_equal());
    assert_eq!(
        verify::compare(c.as_slice(), &[19, 22, 43, 51]),
        Verdict::Mismatch {
            index: 3,
            expected: 50,
            actual: 51
        }
    );
}

#[test]
fn test_blend_reference() {
    let white = ImageFrame::new(2, 1, 3, vec![255; 6]).unwrap();
    let black = ImageFrame::new(2, 1, 3, vec![0; 6]).unwrap();
    let out = cpu::blend_intensity(&white, &black).unwrap();
    assert_eq!(out.channels(), 1);
    assert_eq!(out.as_bytes(), &[63, 63]);
    let out = cpu::blend_intensity(&white, &white).unwrap();
    assert_eq!(out.as_bytes(), &[127, 127]);
}

#[test]
fn test_no_platform_before_allocation() {
    let inventory = DeviceInventory::empty();
    assert!(matches!(
        inventory.select(&DeviceRequest::default()),
        Err(HarnessError::NoPlatform)
    ));
    let cfg = HarnessConfig {
        size: 2,
        seed: Some(1),
        ..HarnessConfig::default()
    };
    assert!(matches!(
        run_matmul(&inventory, &cfg),
        Err(HarnessError::NoPlatform)
    ));
    assert!(matches!(
        run_image(&inventory, &cfg),
        Err(HarnessError::NoPlatform)
    ));
}

#[test]
fn test_unknown_entry_point() {
    let source = KernelSource::blend();
    match source.signature("computeIntensity") {
        Err(HarnessError::EntryPointNotFound { name, available }) => {
            assert_eq!(name, "computeIntensity");
            assert_eq!(available, vec![BLEND_ENTRY.to_string()]);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(KernelSource::matmul().signature(MATMUL_ENTRY).is_ok());
}

#[test]
fn test_bundled_sources_validate() {
    KernelSource::matmul().validate().unwrap();
    KernelSource::blend().validate().unwrap();
}
