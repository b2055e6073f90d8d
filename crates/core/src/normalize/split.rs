use crate::domain::snapshot::DeviceSplit;

/// Clamp negative (or non-finite) shares to zero and rescale the remainder so
/// the shares sum to `total`.
///
/// Percentages derived by subtracting known classes from a total can go
/// negative when the known classes already exceed it; this is the single
/// place that repairs such splits. When every share clamps to zero the total
/// is distributed evenly.
pub fn clamp_and_redistribute(shares: &mut [f64], total: f64) {
    if shares.is_empty() {
        return;
    }

    for s in shares.iter_mut() {
        if !s.is_finite() || *s < 0.0 {
            *s = 0.0;
        }
    }

    let sum: f64 = shares.iter().sum();
    if sum <= 0.0 {
        let each = total / shares.len() as f64;
        for s in shares.iter_mut() {
            *s = each;
        }
        return;
    }

    let scale = total / sum;
    for s in shares.iter_mut() {
        *s *= scale;
    }
}

/// Build a device split from explicit mobile/desktop percentages, deriving
/// tablet as the residual. The residual may be negative when the explicit
/// classes sum over 100; the clamp-and-redistribute pass repairs that before
/// anything observes a negative share.
pub fn device_split_from_explicit(mobile: f64, desktop: f64) -> DeviceSplit {
    let tablet = 100.0 - mobile - desktop;
    device_split(mobile, desktop, tablet)
}

/// Repair an arbitrary mobile/desktop/tablet triple into a valid split:
/// all classes >= 0, one-decimal precision, total exactly 100.
pub fn device_split(mobile: f64, desktop: f64, tablet: f64) -> DeviceSplit {
    let mut shares = [mobile, desktop, tablet];
    clamp_and_redistribute(&mut shares, 100.0);

    // Round mobile/desktop to one decimal and give tablet the exact
    // remainder, so rounding can never push the total off 100.
    let mobile = round1(shares[0]);
    let desktop = round1(shares[1]);
    let mut tablet = round1(100.0 - mobile - desktop);
    let mut desktop = desktop;
    if tablet < 0.0 {
        tablet = 0.0;
        desktop = round1(100.0 - mobile);
    }

    DeviceSplit {
        mobile,
        desktop,
        tablet,
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
