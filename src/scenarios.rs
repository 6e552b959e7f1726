//! Built-in networks used by the demo binary and the tests.

use crate::generator::GeneratorConfig;
use crate::math::{LineSegment2d, Point2d};
use crate::network::{Endpoint, IntersectionAttributes, LinkAttributes, Network, NetworkBuilder};
use crate::{IntersectionId, LinkId};

/// Speed limit on all built-in links, in m/s (50 km/h).
const SPEED_LIMIT: f64 = 13.9;

/// Distance from a road's centre line to each of its lanes, in m.
const LANE_OFFSET: f64 = 2.0;

/// A network together with the traffic that enters it.
#[derive(Clone, Debug)]
pub struct Scenario {
    pub name: String,
    pub network: Network,
    pub generator: GeneratorConfig,
}

impl Scenario {
    pub fn new(name: &str, network: Network, generator: GeneratorConfig) -> Self {
        Self {
            name: name.to_string(),
            network,
            generator,
        }
    }
}

fn link(
    builder: &mut NetworkBuilder,
    start: (f64, f64),
    end: (f64, f64),
    from: Endpoint,
    to: Endpoint,
) -> LinkId {
    builder.add_link(&LinkAttributes {
        geometry: LineSegment2d::from_ends(
            Point2d::new(start.0, start.1),
            Point2d::new(end.0, end.1),
        ),
        from,
        to,
        speed_limit: SPEED_LIMIT,
        capacity: 0,
    })
}

/// Adds a two-way road between `p` and `q`: one link each way, each offset
/// 2 m to the right of its direction of travel. Returns `(p -> q, q -> p)`.
fn road(
    builder: &mut NetworkBuilder,
    p: (f64, f64),
    q: (f64, f64),
    p_end: Endpoint,
    q_end: Endpoint,
) -> (LinkId, LinkId) {
    let (dx, dy) = (q.0 - p.0, q.1 - p.1);
    let len = f64::hypot(dx, dy);
    let (ox, oy) = (LANE_OFFSET * dy / len, -LANE_OFFSET * dx / len);
    let forward = link(builder, (p.0 + ox, p.1 + oy), (q.0 + ox, q.1 + oy), p_end, q_end);
    let backward = link(builder, (q.0 - ox, q.1 - oy), (p.0 - ox, p.1 - oy), q_end, p_end);
    (forward, backward)
}

/// One lane group per approach and one phase per group, in the given order.
fn phase_per_approach(builder: &mut NetworkBuilder, intersection: IntersectionId, approaches: &[LinkId]) {
    for approach in approaches {
        let group = builder.add_lane_group(intersection, &[*approach]);
        builder.add_phase(intersection, &[group]);
    }
}

/// Two signalised intersections, A and B, 240 m apart on an east-west arterial,
/// each with a cross street arriving from the north and leaving to the south.
///
/// Each intersection has two phases: the arterial, then the cross street.
/// Every entry link receives `rate` arrivals per tick.
pub fn corridor(rate: f64) -> Scenario {
    use Endpoint::Boundary;

    let mut b = NetworkBuilder::new();
    let ia = b.add_intersection(&IntersectionAttributes { name: "A".into() });
    let ib = b.add_intersection(&IntersectionAttributes { name: "B".into() });
    let (a, bb) = (Endpoint::Intersection(ia), Endpoint::Intersection(ib));

    // Eastbound
    let w_in = link(&mut b, (-120.0, -2.0), (0.0, -2.0), Boundary, a);
    let ab = link(&mut b, (0.0, -2.0), (240.0, -2.0), a, bb);
    let e_out = link(&mut b, (240.0, -2.0), (360.0, -2.0), bb, Boundary);
    // Westbound
    let e_in = link(&mut b, (360.0, 2.0), (240.0, 2.0), Boundary, bb);
    let ba = link(&mut b, (240.0, 2.0), (0.0, 2.0), bb, a);
    let w_out = link(&mut b, (0.0, 2.0), (-120.0, 2.0), a, Boundary);
    // Cross streets
    let na_in = link(&mut b, (-2.0, 120.0), (-2.0, 0.0), Boundary, a);
    let as_out = link(&mut b, (2.0, 0.0), (2.0, -120.0), a, Boundary);
    let nb_in = link(&mut b, (238.0, 120.0), (238.0, 0.0), Boundary, bb);
    let bs_out = link(&mut b, (242.0, 0.0), (242.0, -120.0), bb, Boundary);

    for (intersection, arterial, cross) in [(ia, [w_in, ba], na_in), (ib, [ab, e_in], nb_in)] {
        let g_arterial = b.add_lane_group(intersection, &arterial);
        let g_cross = b.add_lane_group(intersection, &[cross]);
        b.add_group_conflict(intersection, g_arterial, g_cross);
        b.add_phase(intersection, &[g_arterial]);
        b.add_phase(intersection, &[g_cross]);
    }

    b.add_route(&[w_in, ab, e_out], 3.0);
    b.add_route(&[w_in, as_out], 1.0);
    b.add_route(&[e_in, ba, w_out], 3.0);
    b.add_route(&[e_in, bs_out], 1.0);
    b.add_route(&[na_in, as_out], 1.0);
    b.add_route(&[na_in, ab, e_out], 1.0);
    b.add_route(&[nb_in, bs_out], 1.0);
    b.add_route(&[nb_in, ba, w_out], 1.0);

    let network = b.build().expect("Corridor topology is invalid");
    let generator = GeneratorConfig {
        default_rate: rate,
        ..Default::default()
    };
    Scenario::new("corridor", network, generator)
}

/// A single intersection with four approaches. Straight-through movements cross
/// the intersection box on connector links, and the east-west connectors physically
/// cross the north-south ones.
///
/// Two phases: east-west, then north-south.
pub fn four_way(rate: f64) -> Scenario {
    use Endpoint::Boundary;

    let mut b = NetworkBuilder::new();
    let ix = b.add_intersection(&IntersectionAttributes { name: "X".into() });
    let x = Endpoint::Intersection(ix);

    let w_in = link(&mut b, (-130.0, -2.0), (-10.0, -2.0), Boundary, x);
    let e_in = link(&mut b, (130.0, 2.0), (10.0, 2.0), Boundary, x);
    let n_in = link(&mut b, (-2.0, 130.0), (-2.0, 10.0), Boundary, x);
    let s_in = link(&mut b, (2.0, -130.0), (2.0, -10.0), Boundary, x);

    let we = link(&mut b, (-10.0, -2.0), (10.0, -2.0), x, x);
    let ew = link(&mut b, (10.0, 2.0), (-10.0, 2.0), x, x);
    let ns = link(&mut b, (-2.0, 10.0), (-2.0, -10.0), x, x);
    let sn = link(&mut b, (2.0, -10.0), (2.0, 10.0), x, x);

    let e_out = link(&mut b, (10.0, -2.0), (130.0, -2.0), x, Boundary);
    let w_out = link(&mut b, (-10.0, 2.0), (-130.0, 2.0), x, Boundary);
    let s_out = link(&mut b, (-2.0, -10.0), (-2.0, -130.0), x, Boundary);
    let n_out = link(&mut b, (2.0, 10.0), (2.0, 130.0), x, Boundary);

    let g_ew = b.add_lane_group(ix, &[w_in, e_in]);
    let g_ns = b.add_lane_group(ix, &[n_in, s_in]);
    b.add_group_conflict(ix, g_ew, g_ns);
    b.add_phase(ix, &[g_ew]);
    b.add_phase(ix, &[g_ns]);

    for horizontal in [we, ew] {
        for vertical in [ns, sn] {
            b.add_link_conflict(horizontal, vertical);
        }
    }

    b.add_route(&[w_in, we, e_out], 1.0);
    b.add_route(&[e_in, ew, w_out], 1.0);
    b.add_route(&[n_in, ns, s_out], 1.0);
    b.add_route(&[s_in, sn, n_out], 1.0);

    let network = b.build().expect("Four-way topology is invalid");
    let generator = GeneratorConfig {
        default_rate: rate,
        ..Default::default()
    };
    Scenario::new("four-way", network, generator)
}

/// A T-junction missing its northern arm. Traffic runs east-west through the
/// junction and turns out of the southern arm in either direction.
///
/// Three phases: westbound approach, eastbound approach, then the southern arm.
pub fn t_junction(rate: f64) -> Scenario {
    use Endpoint::Boundary;

    let mut b = NetworkBuilder::new();
    let ix = b.add_intersection(&IntersectionAttributes { name: "T".into() });
    let x = Endpoint::Intersection(ix);

    let w_in = link(&mut b, (-72.0, -2.0), (-12.0, -2.0), Boundary, x);
    let e_in = link(&mut b, (72.0, 2.0), (12.0, 2.0), Boundary, x);
    let s_in = link(&mut b, (2.0, -72.0), (2.0, -12.0), Boundary, x);

    let e_out = link(&mut b, (12.0, -2.0), (72.0, -2.0), x, Boundary);
    let w_out = link(&mut b, (-12.0, 2.0), (-72.0, 2.0), x, Boundary);

    let we = link(&mut b, (-12.0, -2.0), (12.0, -2.0), x, x);
    let ew = link(&mut b, (12.0, 2.0), (-12.0, 2.0), x, x);
    let sw = link(&mut b, (2.0, -12.0), (-12.0, 2.0), x, x);
    let se = link(&mut b, (2.0, -12.0), (12.0, -2.0), x, x);

    phase_per_approach(&mut b, ix, &[w_in, e_in, s_in]);
    // The left turn out of the southern arm cuts across the eastbound movement.
    b.add_link_conflict(we, sw);

    b.add_route(&[w_in, we, e_out], 3.0);
    b.add_route(&[e_in, ew, w_out], 3.0);
    b.add_route(&[s_in, sw, w_out], 2.0);
    b.add_route(&[s_in, se, e_out], 2.0);

    let network = b.build().expect("T-junction topology is invalid");
    let generator = GeneratorConfig {
        default_rate: rate,
        ..Default::default()
    };
    Scenario::new("t-junction", network, generator)
}

/// Four intersections on a 200 m square grid, each with two boundary arms.
/// Traffic crosses the grid straight through or turns once at a corner.
///
/// Each intersection has four phases, one per approach: west, east, north, south.
pub fn grid_2x2(rate: f64) -> Scenario {
    use Endpoint::Boundary;

    let mut b = NetworkBuilder::new();
    let names = ["TL", "TR", "BL", "BR"];
    let [tl, tr, bl, br] =
        names.map(|name| b.add_intersection(&IntersectionAttributes { name: name.into() }));
    let [ptl, ptr, pbl, pbr] = [(0.0, 200.0), (200.0, 200.0), (0.0, 0.0), (200.0, 0.0)];
    let node = Endpoint::Intersection;

    // Arms from the boundary, inbound first.
    let (w_tl, tl_w) = road(&mut b, (-150.0, 200.0), ptl, Boundary, node(tl));
    let (n_tl, tl_n) = road(&mut b, (0.0, 350.0), ptl, Boundary, node(tl));
    let (e_tr, tr_e) = road(&mut b, (350.0, 200.0), ptr, Boundary, node(tr));
    let (n_tr, tr_n) = road(&mut b, (200.0, 350.0), ptr, Boundary, node(tr));
    let (w_bl, bl_w) = road(&mut b, (-150.0, 0.0), pbl, Boundary, node(bl));
    let (s_bl, bl_s) = road(&mut b, (0.0, -150.0), pbl, Boundary, node(bl));
    let (e_br, br_e) = road(&mut b, (350.0, 0.0), pbr, Boundary, node(br));
    let (s_br, br_s) = road(&mut b, (200.0, -150.0), pbr, Boundary, node(br));

    // Internal roads.
    let (tl_tr, tr_tl) = road(&mut b, ptl, ptr, node(tl), node(tr));
    let (bl_br, br_bl) = road(&mut b, pbl, pbr, node(bl), node(br));
    let (tl_bl, bl_tl) = road(&mut b, ptl, pbl, node(tl), node(bl));
    let (tr_br, br_tr) = road(&mut b, ptr, pbr, node(tr), node(br));

    for (intersection, approaches) in [
        (tl, [w_tl, tr_tl, n_tl, bl_tl]),
        (tr, [tl_tr, e_tr, n_tr, br_tr]),
        (bl, [w_bl, br_bl, tl_bl, s_bl]),
        (br, [bl_br, e_br, tr_br, s_br]),
    ] {
        let groups = approaches.map(|approach| b.add_lane_group(intersection, &[approach]));
        for horizontal in &groups[..2] {
            for vertical in &groups[2..] {
                b.add_group_conflict(intersection, *horizontal, *vertical);
            }
        }
        for group in groups {
            b.add_phase(intersection, &[group]);
        }
    }

    let routes: [&[LinkId]; 12] = [
        // Straight across
        &[w_tl, tl_tr, tr_e],
        &[e_tr, tr_tl, tl_w],
        &[w_bl, bl_br, br_e],
        &[e_br, br_bl, bl_w],
        &[n_tl, tl_bl, bl_s],
        &[s_bl, bl_tl, tl_n],
        &[n_tr, tr_br, br_s],
        &[s_br, br_tr, tr_n],
        // One turn
        &[w_tl, tl_bl, bl_s],
        &[n_tr, tr_tl, tl_w],
        &[s_br, br_bl, bl_w],
        &[e_br, br_tr, tr_n],
    ];
    for route in routes {
        b.add_route(route, 1.0);
    }

    let network = b.build().expect("Grid topology is invalid");
    let generator = GeneratorConfig {
        default_rate: rate,
        ..Default::default()
    };
    Scenario::new("grid-2x2", network, generator)
}

/// Three intersections on a north-south arterial, 250 m apart: Top, Mid and Bot.
/// Top has north and east arms, Mid east and west arms, Bot south and east arms.
///
/// Top and Bot have three phases each and Mid has four, one per approach.
pub fn arterial_three(rate: f64) -> Scenario {
    use Endpoint::Boundary;

    let mut b = NetworkBuilder::new();
    let [top, mid, bot] = ["Top", "Mid", "Bot"]
        .map(|name| b.add_intersection(&IntersectionAttributes { name: name.into() }));
    let [pt, pm, pb] = [(0.0, 250.0), (0.0, 0.0), (0.0, -250.0)];
    let node = Endpoint::Intersection;

    let (n_top, top_n) = road(&mut b, (0.0, 450.0), pt, Boundary, node(top));
    let (e_top, top_e) = road(&mut b, (250.0, 250.0), pt, Boundary, node(top));
    let (e_mid, mid_e) = road(&mut b, (250.0, 0.0), pm, Boundary, node(mid));
    let (w_mid, mid_w) = road(&mut b, (-250.0, 0.0), pm, Boundary, node(mid));
    let (s_bot, bot_s) = road(&mut b, (0.0, -450.0), pb, Boundary, node(bot));
    let (e_bot, bot_e) = road(&mut b, (250.0, -250.0), pb, Boundary, node(bot));
    let (top_mid, mid_top) = road(&mut b, pt, pm, node(top), node(mid));
    let (mid_bot, bot_mid) = road(&mut b, pm, pb, node(mid), node(bot));

    phase_per_approach(&mut b, top, &[n_top, e_top, mid_top]);
    phase_per_approach(&mut b, mid, &[e_mid, w_mid, top_mid, bot_mid]);
    phase_per_approach(&mut b, bot, &[s_bot, e_bot, mid_bot]);

    // From the north end, every exit is reached through Mid.
    for entry in [n_top, e_top] {
        b.add_route(&[entry, top_mid, mid_e], 1.0);
        b.add_route(&[entry, top_mid, mid_w], 1.0);
        b.add_route(&[entry, top_mid, mid_bot, bot_s], 1.0);
        b.add_route(&[entry, top_mid, mid_bot, bot_e], 1.0);
    }
    for entry in [e_mid, w_mid] {
        b.add_route(&[entry, mid_bot, bot_s], 1.0);
        b.add_route(&[entry, mid_bot, bot_e], 1.0);
        b.add_route(&[entry, mid_top, top_n], 1.0);
        b.add_route(&[entry, mid_top, top_e], 1.0);
    }
    for entry in [s_bot, e_bot] {
        b.add_route(&[entry, bot_mid, mid_e], 1.0);
        b.add_route(&[entry, bot_mid, mid_w], 1.0);
        b.add_route(&[entry, bot_mid, mid_top, top_n], 1.0);
        b.add_route(&[entry, bot_mid, mid_top, top_e], 1.0);
    }

    let network = b.build().expect("Arterial topology is invalid");
    let generator = GeneratorConfig {
        default_rate: rate,
        ..Default::default()
    };
    Scenario::new("arterial-three", network, generator)
}

/// Every built-in scenario, in a fixed order.
pub fn all(rate: f64) -> Vec<Scenario> {
    vec![
        four_way(rate),
        t_junction(rate),
        corridor(rate),
        grid_2x2(rate),
        arterial_three(rate),
    ]
}
