//! End-to-end gate behavior on synthetic landmark detections.

use head_pose::{
    Axis, CanonicalLandmark, EvaluateError, Evaluation, FrameView, LandmarkDetector,
    LandmarkPoint, LandmarkSet, PoseEvaluator, PoseMargins, RejectReason,
};

const WIDTH: usize = 640;
const HEIGHT: usize = 480;

struct StubDetector {
    faces: Vec<LandmarkSet>,
}

impl LandmarkDetector for StubDetector {
    fn detect(&self, _frame: &FrameView<'_>) -> Vec<LandmarkSet> {
        self.faces.clone()
    }
}

fn gate(faces: Vec<LandmarkSet>) -> PoseEvaluator<StubDetector> {
    PoseEvaluator::new(StubDetector { faces })
}

fn landmark(index: u32, px: f64, py: f64, z: f32) -> LandmarkPoint {
    // Pixel centers, so the gate's truncation lands back on (px, py).
    LandmarkPoint {
        index,
        x: ((px + 0.5) / WIDTH as f64) as f32,
        y: ((py + 0.5) / HEIGHT as f64) as f32,
        z,
    }
}

/// A face filling most of the frame, centered on the principal point.
fn near_face(depth: impl Fn(f64, f64) -> f32) -> LandmarkSet {
    let layout = [
        (33u32, 60.0, 120.0),
        (263, 580.0, 120.0),
        (1, 320.0, 300.0),
        (61, 200.0, 400.0),
        (291, 440.0, 400.0),
        (199, 320.0, 470.0),
    ];
    LandmarkSet::new(
        layout
            .iter()
            .map(|&(index, px, py)| landmark(index, px, py, depth(px, py)))
            .collect(),
    )
}

/// A smaller face around the frame center.
fn far_face(depth: impl Fn(f64, f64) -> f32) -> LandmarkSet {
    let layout = [
        (33u32, 200.0, 160.0),
        (263, 440.0, 160.0),
        (1, 320.0, 240.0),
        (61, 250.0, 320.0),
        (291, 390.0, 320.0),
        (199, 320.0, 399.0),
    ];
    LandmarkSet::new(
        layout
            .iter()
            .map(|&(index, px, py)| landmark(index, px, py, depth(px, py)))
            .collect(),
    )
}

fn degenerate_face() -> LandmarkSet {
    let indices = [33u32, 263, 1, 61, 291, 199];
    LandmarkSet::new(
        indices
            .iter()
            .map(|&index| landmark(index, 320.0, 240.0, 0.0))
            .collect(),
    )
}

fn pixels() -> Vec<u8> {
    vec![0u8; WIDTH * HEIGHT]
}

#[test]
fn frontal_face_passes_the_gate() {
    let data = pixels();
    let frame = FrameView { width: WIDTH, height: HEIGHT, data: &data };
    let gate = gate(vec![near_face(|_, _| -0.03)]);

    let outcome = gate.evaluate(&frame, &PoseMargins::default()).expect("evaluate");
    assert_eq!(outcome, Evaluation::Accepted);

    let pose = gate.head_pose(&frame).expect("fit").expect("one face");
    assert!(pose.angles.roll.abs() < 0.5, "{}", pose.angles);
    assert!(pose.angles.pitch.abs() < 0.5, "{}", pose.angles);
    assert!(pose.angles.yaw.abs() < 0.5, "{}", pose.angles);
}

#[test]
fn vertical_depth_gradient_is_rejected_on_roll() {
    let data = pixels();
    let frame = FrameView { width: WIDTH, height: HEIGHT, data: &data };
    let gate = gate(vec![near_face(|_, py| (0.3 * (py - 240.0)) as f32)]);

    let outcome = gate.evaluate(&frame, &PoseMargins::default()).expect("evaluate");
    assert_eq!(outcome, Evaluation::Rejected(RejectReason::Margin(Axis::Roll)));

    // The landmark layout is mirror symmetric about the vertical centerline
    // and the depth varies only with y, so the fit tilts purely about x.
    let pose = gate.head_pose(&frame).expect("fit").expect("one face");
    assert!(pose.angles.roll.abs() > 3.0, "{}", pose.angles);
    assert!(pose.angles.pitch.abs() < 1.0, "{}", pose.angles);
    assert!(pose.angles.yaw.abs() < 1.0, "{}", pose.angles);
}

#[test]
fn horizontal_depth_gradient_is_rejected_on_pitch() {
    let data = pixels();
    let frame = FrameView { width: WIDTH, height: HEIGHT, data: &data };
    let gate = gate(vec![near_face(|px, _| (0.38 * (px - 320.0)) as f32)]);

    let outcome = gate.evaluate(&frame, &PoseMargins::default()).expect("evaluate");
    assert_eq!(outcome, Evaluation::Rejected(RejectReason::Margin(Axis::Pitch)));

    let pose = gate.head_pose(&frame).expect("fit").expect("one face");
    assert!(pose.angles.pitch.abs() > 3.0, "{}", pose.angles);
    assert!(pose.angles.roll.abs() < 1.0, "{}", pose.angles);
}

#[test]
fn diagonal_depth_gradient_is_rejected_on_yaw() {
    let data = pixels();
    let frame = FrameView { width: WIDTH, height: HEIGHT, data: &data };
    let gate = gate(vec![near_face(|px, py| (0.25 * ((px - 320.0) + (py - 300.0))) as f32)]);

    // A tilt about a diagonal in-plane axis decomposes into all three Euler
    // slots. Opening roll and pitch leaves the residual z component as the
    // first violation the ordered scan reaches.
    let margins = PoseMargins::new(90.0, 90.0, 0.25).expect("valid margins");
    let outcome = gate.evaluate(&frame, &margins).expect("evaluate");
    assert_eq!(outcome, Evaluation::Rejected(RejectReason::Margin(Axis::Yaw)));

    let pose = gate.head_pose(&frame).expect("fit").expect("one face");
    assert!(pose.angles.roll.abs() > 3.0, "{}", pose.angles);
    assert!(pose.angles.pitch.abs() > 3.0, "{}", pose.angles);
    assert!(pose.angles.yaw.abs() > 0.25, "{}", pose.angles);
}

#[test]
fn tight_margins_reject_a_small_face_tilt() {
    let data = pixels();
    let frame = FrameView { width: WIDTH, height: HEIGHT, data: &data };
    let gate = gate(vec![far_face(|_, py| (0.2 * (py - 240.0)) as f32)]);

    let margins = PoseMargins::new(1.5, 1.5, 1.5).expect("valid margins");
    let outcome = gate.evaluate(&frame, &margins).expect("evaluate");
    assert_eq!(outcome, Evaluation::Rejected(RejectReason::Margin(Axis::Roll)));
}

#[test]
fn wide_roll_margin_admits_the_same_tilt() {
    let data = pixels();
    let frame = FrameView { width: WIDTH, height: HEIGHT, data: &data };
    let gate = gate(vec![far_face(|_, py| (0.2 * (py - 240.0)) as f32)]);

    let margins = PoseMargins::new(90.0, 3.0, 3.0).expect("valid margins");
    let outcome = gate.evaluate(&frame, &margins).expect("evaluate");
    assert_eq!(outcome, Evaluation::Accepted);
}

#[test]
fn no_face_is_a_rejection_not_an_error() {
    let data = pixels();
    let frame = FrameView { width: WIDTH, height: HEIGHT, data: &data };
    let gate = gate(Vec::new());

    let outcome = gate.evaluate(&frame, &PoseMargins::default()).expect("evaluate");
    assert_eq!(outcome, Evaluation::Rejected(RejectReason::NoFace));
    assert!(gate.head_pose(&frame).expect("fit").is_none());
}

#[test]
fn only_the_first_face_is_evaluated() {
    let data = pixels();
    let frame = FrameView { width: WIDTH, height: HEIGHT, data: &data };

    let frontal_first = gate(vec![near_face(|_, _| -0.03), degenerate_face()]);
    let outcome = frontal_first.evaluate(&frame, &PoseMargins::default()).expect("evaluate");
    assert_eq!(outcome, Evaluation::Accepted);

    let degenerate_first = gate(vec![degenerate_face(), near_face(|_, _| -0.03)]);
    let outcome = degenerate_first.evaluate(&frame, &PoseMargins::default()).expect("evaluate");
    assert_eq!(outcome, Evaluation::Rejected(RejectReason::SolveFailed));
}

#[test]
fn degenerate_landmarks_reject_as_solve_failure() {
    let data = pixels();
    let frame = FrameView { width: WIDTH, height: HEIGHT, data: &data };

    let coincident = gate(vec![degenerate_face()]);
    let outcome = coincident.evaluate(&frame, &PoseMargins::default()).expect("evaluate");
    assert_eq!(outcome, Evaluation::Rejected(RejectReason::SolveFailed));

    let indices = [33u32, 263, 1, 61, 291, 199];
    let collinear = gate(vec![LandmarkSet::new(
        indices
            .iter()
            .enumerate()
            .map(|(i, &index)| landmark(index, 100.0 + 80.0 * i as f64, 240.0, 0.0))
            .collect(),
    )]);
    let outcome = collinear.evaluate(&frame, &PoseMargins::default()).expect("evaluate");
    assert_eq!(outcome, Evaluation::Rejected(RejectReason::SolveFailed));
}

#[test]
fn empty_frame_is_an_error() {
    let frame = FrameView { width: 0, height: HEIGHT, data: &[] };
    let gate = gate(vec![near_face(|_, _| 0.0)]);

    let err = gate.evaluate(&frame, &PoseMargins::default()).unwrap_err();
    assert!(matches!(err, EvaluateError::EmptyFrame { width: 0, .. }));
}

#[test]
fn missing_landmark_is_an_error() {
    let data = pixels();
    let frame = FrameView { width: WIDTH, height: HEIGHT, data: &data };
    let face = LandmarkSet::new(
        near_face(|_, _| 0.0)
            .iter()
            .copied()
            .filter(|p| p.index != 199)
            .collect(),
    );
    let gate = gate(vec![face]);

    let err = gate.evaluate(&frame, &PoseMargins::default()).unwrap_err();
    assert!(matches!(
        err,
        EvaluateError::MissingLandmark {
            role: CanonicalLandmark::Chin,
            index: 199
        }
    ));
}
