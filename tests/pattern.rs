use glcam::app::{Context, Flow, Handler, MenuItem, KEY_ESCAPE};
use glcam::config::CaptureConfig;
use glcam::session;
use glcam::source::{FrameSource, TestPattern, DEFAULT_PATTERN_FRAMES};
use glcam::Encoding;

fn nth(src: &mut dyn FrameSource, n: usize) -> Vec<u8> {
    for _ in 1..n {
        src.next_frame().unwrap();
    }
    src.next_frame().unwrap().unwrap().data.to_vec()
}

#[test]
fn pattern_repeats_after_a_full_cycle() {
    for encoding in Encoding::ALL {
        for k in [1, 2, 7] {
            let mut a = TestPattern::new(encoding, 64, 48).unwrap();
            let mut b = TestPattern::new(encoding, 64, 48).unwrap();
            assert_eq!(
                nth(&mut a, DEFAULT_PATTERN_FRAMES + k),
                nth(&mut b, k),
                "{} frame {}",
                encoding,
                k
            );
        }
    }
}

#[test]
fn frame_sizes() {
    let mut luma = TestPattern::new(Encoding::Luma, 320, 240).unwrap();
    assert_eq!(luma.next_frame().unwrap().unwrap().len(), 76800);

    assert_eq!(Encoding::Yuv420.bytes_per_frame(320, 240), 153600);
    let mut yuv = TestPattern::new(Encoding::Yuv420, 320, 240).unwrap();
    assert_eq!(yuv.next_frame().unwrap().unwrap().len(), 115200);
}

#[test]
fn demo_session_on_the_test_pattern() {
    let config = CaptureConfig {
        test_pattern: true,
        encoding: Encoding::Rgb,
        width: 32,
        height: 16,
        ..Default::default()
    };
    let mut ctx = Context::new(session::open(&config).unwrap());
    assert_eq!(ctx.source().dimensions(), (32, 16));

    for _ in 0..45 {
        assert!(ctx.idle().unwrap().is_some());
    }
    assert_eq!(ctx.frames(), 45);

    ctx.menu(MenuItem::ToggleHistogram);
    assert!(ctx.view().histogram);
    assert_eq!(ctx.key(KEY_ESCAPE), Flow::Exit);
    assert!(ctx.idle().unwrap().is_none());
}
