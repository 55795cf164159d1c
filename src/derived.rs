//! Advanced-metric derivation over raw box-score totals.
//!
//! Every ratio follows one null policy: a zero or missing denominator (or a
//! missing numerator term) yields null, never an error. Division by zero is
//! data here, a team that never attempted a free throw simply has no FT%.

use crate::record::StatLine;

/// Null-aware lookup: absent key and present-but-null both read as None.
pub fn get(stats: &StatLine, key: &str) -> Option<f64> {
    stats.get(key).copied().flatten()
}

/// num / den under the null policy.
pub fn ratio(num: Option<f64>, den: Option<f64>) -> Option<f64> {
    match (num, den) {
        (Some(n), Some(d)) if d > 0.0 => Some(n / d),
        _ => None,
    }
}

fn put(stats: &mut StatLine, key: &str, value: Option<f64>) {
    stats.insert(key.to_string(), value);
}

fn sub(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? - b?)
}

/// The common derived set, identical for teams and players. `team_fg` is the
/// owning team's made field goals: HOB normalizes by the team total even on a
/// player line.
pub fn add_common_derived(stats: &mut StatLine, team_fg: Option<f64>) {
    let fg = get(stats, "FG");
    let fga = get(stats, "FGA");
    let ft = get(stats, "FT");
    let fta = get(stats, "FTA");
    let tp = get(stats, "3P");
    let tpa = get(stats, "3PA");
    let pts = get(stats, "PTS");
    let trb = get(stats, "TRB");
    let orb = get(stats, "ORB");
    let ast = get(stats, "AST");
    let stl = get(stats, "STL");
    let blk = get(stats, "BLK");
    let tov = get(stats, "TOV");
    let pf = get(stats, "PF");

    put(stats, "FG%", ratio(fg, fga));
    put(stats, "FT%", ratio(ft, fta));
    put(stats, "3P%", ratio(tp, tpa));
    put(
        stats,
        "eFG%",
        ratio(fg.zip(tp).map(|(fg, tp)| fg + 0.5 * tp), fga),
    );
    let tsa = fga.zip(fta).map(|(fga, fta)| fga + 0.44 * fta);
    put(stats, "TSA", tsa);
    put(stats, "TS%", ratio(pts, tsa.map(|t| 2.0 * t)));
    put(stats, "3PAr", ratio(tpa, fga));
    put(stats, "FTAr", ratio(fta, fga));

    let two = sub(fg, tp);
    let twoa = sub(fga, tpa);
    put(stats, "2P", two);
    put(stats, "2PA", twoa);
    put(stats, "2P%", ratio(two, twoa));
    put(stats, "2PAr", ratio(twoa, fga));

    let drb = sub(trb, orb);
    put(stats, "DRB", drb);
    put(stats, "ORBr", ratio(orb, trb));
    put(stats, "DRBr", ratio(drb, trb));
    put(stats, "AST/TOV", ratio(ast, tov));
    put(stats, "STL/TOV", ratio(stl, tov));

    let fic = (|| {
        Some(
            pts? + orb? + 0.75 * drb? + ast? + stl? + blk?
                - 0.75 * fga?
                - 0.375 * fta?
                - tov?
                - 0.5 * pf?,
        )
    })();
    put(stats, "FIC", fic);
    put(stats, "FT/FGA", ratio(ft, fga));

    put(
        stats,
        "HOB",
        ratio(fg.zip(ast).map(|(fg, ast)| fg + ast), team_fg),
    );
}

/// Two-sided possession estimate. Symmetric in construction: the first
/// bracketed term is the caller's, the second the opponent's, each weighting
/// missed shots by that side's offensive-rebounding share.
pub fn possessions(team: &StatLine, opp: &StatLine) -> Option<f64> {
    fn side(us: &StatLine, them: &StatLine) -> Option<f64> {
        let fga = get(us, "FGA")?;
        let fg = get(us, "FG")?;
        let fta = get(us, "FTA")?;
        let orb = get(us, "ORB")?;
        let tov = get(us, "TOV")?;
        let opp_drb = get(them, "DRB").or_else(|| sub(get(them, "TRB"), get(them, "ORB")))?;
        let boards = orb + opp_drb;
        if boards <= 0.0 {
            return None;
        }
        Some(fga + 0.4 * fta - 1.07 * (orb / boards) * (fga - fg) + tov)
    }
    Some(0.5 * (side(team, opp)? + side(opp, team)?))
}

/// Team-level derived stats. Must run for both sides before any player
/// derivation: the player rate formulas read the team's OPOS/DPOS and totals.
pub fn add_team_derived(stats: &mut StatLine, opp: &StatLine) {
    let team_fg = get(stats, "FG");
    add_common_derived(stats, team_fg);

    let opos = possessions(stats, opp);
    let dpos = possessions(opp, stats);
    put(stats, "OPOS", opos);
    put(stats, "DPOS", dpos);

    let mp = get(stats, "MP");
    let pace = (|| {
        let mp = mp?;
        if mp <= 0.0 {
            return None;
        }
        Some(48.0 * ((opos? + dpos?) / (2.0 * (mp / 5.0))))
    })();
    put(stats, "PACE", pace);

    let orb = get(stats, "ORB");
    let drb = get(stats, "DRB");
    let trb = get(stats, "TRB");
    let opp_orb = get(opp, "ORB");
    let opp_drb = sub(get(opp, "TRB"), opp_orb);
    let opp_trb = get(opp, "TRB");
    let opp_twoa = sub(get(opp, "FGA"), get(opp, "3PA"));

    put(stats, "ORB%", ratio(orb, orb.zip(opp_drb).map(|(a, b)| a + b)));
    put(stats, "DRB%", ratio(drb, drb.zip(opp_orb).map(|(a, b)| a + b)));
    put(stats, "TRB%", ratio(trb, trb.zip(opp_trb).map(|(a, b)| a + b)));
    put(stats, "AST%", ratio(get(stats, "AST"), team_fg));
    put(stats, "STL%", ratio(get(stats, "STL"), dpos));
    put(stats, "BLK%", ratio(get(stats, "BLK"), opp_twoa));
    put(stats, "TOV%", ratio(get(stats, "TOV"), opos));
}

/// Player-level derived stats: the common set plus rate stats normalized by
/// the share of team minutes the player was on the floor for. Call only when
/// the player's MP is non-null and non-zero; `team` must already carry
/// OPOS/DPOS from `add_team_derived`.
pub fn add_player_derived(pl: &mut StatLine, team: &StatLine, opp: &StatLine) {
    add_common_derived(pl, get(team, "FG"));

    let mp = get(pl, "MP");
    let team_mp = get(team, "MP");
    // Team minutes per floor slot; the scaling factor every rate stat shares.
    let slot = team_mp.map(|m| m / 5.0);

    let scaled = |stat: Option<f64>, pool: Option<f64>| -> Option<f64> {
        let (stat, slot) = stat.zip(slot)?;
        let (mp, pool) = mp.zip(pool)?;
        let den = mp * pool;
        if den > 0.0 { Some(100.0 * stat * slot / den) } else { None }
    };

    let opp_drb = sub(get(opp, "TRB"), get(opp, "ORB"));
    let opp_orb = get(opp, "ORB");
    let team_drb = sub(get(team, "TRB"), get(team, "ORB"));
    let pair = |a: Option<f64>, b: Option<f64>| a.zip(b).map(|(a, b)| a + b);

    put(pl, "ORB%", scaled(get(pl, "ORB"), pair(get(team, "ORB"), opp_drb)));
    put(pl, "DRB%", scaled(get(pl, "DRB"), pair(team_drb, opp_orb)));
    put(pl, "TRB%", scaled(get(pl, "TRB"), pair(get(team, "TRB"), get(opp, "TRB"))));

    let astp = (|| {
        let (mp, slot) = mp.zip(slot)?;
        if slot <= 0.0 {
            return None;
        }
        let den = (mp / slot) * get(team, "FG")? - get(pl, "FG")?;
        if den > 0.0 {
            Some(100.0 * get(pl, "AST")? / den)
        } else {
            None
        }
    })();
    put(pl, "AST%", astp);

    put(pl, "STL%", scaled(get(pl, "STL"), get(team, "DPOS")));
    let opp_twoa = sub(get(opp, "FGA"), get(opp, "3PA"));
    put(pl, "BLK%", scaled(get(pl, "BLK"), opp_twoa));

    // Mixed-term expression, so the zero denominator is checked explicitly
    // rather than through `ratio`.
    let tovp = (|| {
        let den = get(pl, "FGA")? + 0.44 * get(pl, "FTA")? + get(pl, "TOV")?;
        if den > 0.0 {
            Some(100.0 * get(pl, "TOV")? / den)
        } else {
            None
        }
    })();
    put(pl, "TOV%", tovp);
}

/// Signed scoring differential, written to both sides. Runs only once both
/// teams' totals exist.
pub fn add_plus_minus(home: &mut StatLine, away: &mut StatLine) {
    let h = get(home, "PTS");
    let a = get(away, "PTS");
    let diff = h.zip(a).map(|(h, a)| h - a);
    put(home, "+/-", diff);
    put(away, "+/-", diff.map(|d| -d));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(pairs: &[(&str, f64)]) -> StatLine {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Some(*v)))
            .collect()
    }

    fn fixture_team_a() -> StatLine {
        line(&[
            ("MP", 240.0),
            ("FG", 40.0),
            ("FGA", 80.0),
            ("3P", 10.0),
            ("3PA", 20.0),
            ("FT", 10.0),
            ("FTA", 20.0),
            ("ORB", 10.0),
            ("TRB", 40.0),
            ("AST", 20.0),
            ("STL", 5.0),
            ("BLK", 5.0),
            ("TOV", 10.0),
            ("PF", 20.0),
            ("PTS", 100.0),
        ])
    }

    fn fixture_team_b() -> StatLine {
        line(&[
            ("MP", 240.0),
            ("FG", 45.0),
            ("FGA", 90.0),
            ("3P", 5.0),
            ("3PA", 25.0),
            ("FT", 15.0),
            ("FTA", 20.0),
            ("ORB", 10.0),
            ("TRB", 40.0),
            ("AST", 25.0),
            ("STL", 10.0),
            ("BLK", 2.0),
            ("TOV", 15.0),
            ("PF", 18.0),
            ("PTS", 110.0),
        ])
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn zero_fga_nulls_every_fga_ratio() {
        let mut stats = line(&[
            ("FG", 0.0),
            ("FGA", 0.0),
            ("FT", 0.0),
            ("FTA", 0.0),
            ("3P", 0.0),
            ("3PA", 0.0),
            ("PTS", 0.0),
            ("TRB", 0.0),
            ("ORB", 0.0),
            ("AST", 0.0),
            ("STL", 0.0),
            ("BLK", 0.0),
            ("TOV", 0.0),
            ("PF", 0.0),
        ]);
        add_common_derived(&mut stats, Some(0.0));
        for key in ["FG%", "eFG%", "3PAr", "FTAr", "2PAr", "FT/FGA", "TS%", "HOB"] {
            assert_eq!(get(&stats, key), None, "{key} should be null");
        }
        // FIC has no denominator, it survives.
        assert_eq!(get(&stats, "FIC"), Some(0.0));
    }

    #[test]
    fn missing_denominator_is_null_not_error() {
        let mut stats = line(&[("FG", 10.0)]);
        add_common_derived(&mut stats, Some(10.0));
        assert_eq!(get(&stats, "FG%"), None);
        assert_eq!(get(&stats, "FIC"), None);
    }

    #[test]
    fn common_derived_spot_values() {
        let mut a = fixture_team_a();
        add_common_derived(&mut a, Some(40.0));
        assert!(close(get(&a, "FG%").unwrap(), 0.5));
        assert!(close(get(&a, "eFG%").unwrap(), 45.0 / 80.0));
        assert!(close(get(&a, "TSA").unwrap(), 88.8));
        assert!(close(get(&a, "TS%").unwrap(), 100.0 / 177.6));
        assert!(close(get(&a, "2P").unwrap(), 30.0));
        assert!(close(get(&a, "2PA").unwrap(), 60.0));
        assert!(close(get(&a, "DRB").unwrap(), 30.0));
        assert!(close(get(&a, "AST/TOV").unwrap(), 2.0));
        // FIC = 100 + 10 + 22.5 + 20 + 5 + 5 - 60 - 7.5 - 10 - 10
        assert!(close(get(&a, "FIC").unwrap(), 75.0));
        // HOB against team FG.
        assert!(close(get(&a, "HOB").unwrap(), 60.0 / 40.0));
    }

    #[test]
    fn possessions_matches_hand_computed_fixture() {
        let a = fixture_team_a();
        let b = fixture_team_b();
        // A side: 80 + 8 - 1.07*(10/40)*40 + 10 = 87.3
        // B side: 90 + 8 - 1.07*(10/40)*45 + 15 = 100.9625
        let poss = possessions(&a, &b).unwrap();
        assert!(close(poss, 0.5 * (87.3 + 100.9625)));
    }

    #[test]
    fn possessions_is_symmetric_in_its_pairing() {
        let a = fixture_team_a();
        let b = fixture_team_b();
        // Swapping the inputs must reproduce the paired formula exactly.
        assert!(close(
            possessions(&a, &b).unwrap(),
            possessions(&b, &a).unwrap()
        ));
    }

    #[test]
    fn team_derived_pace_fixture() {
        let mut a = fixture_team_a();
        let b = fixture_team_b();
        add_team_derived(&mut a, &b);
        // With MP = 240 the pace equals the possession estimate.
        assert!(close(get(&a, "PACE").unwrap(), 94.13125));
        assert!(close(get(&a, "OPOS").unwrap(), get(&a, "DPOS").unwrap()));
        assert!(close(get(&a, "ORB%").unwrap(), 0.25));
        assert!(close(get(&a, "STL%").unwrap(), 5.0 / 94.13125));
    }

    #[test]
    fn rebounding_shares_reflect_only_the_named_sides() {
        // Distinct rebounding profiles: ORB% of A must use A's ORB against
        // B's DRB, never the reverse pairing.
        let mut a = fixture_team_a();
        let mut b = fixture_team_b();
        a.insert("ORB".to_string(), Some(20.0));
        a.insert("TRB".to_string(), Some(50.0));
        b.insert("ORB".to_string(), Some(5.0));
        b.insert("TRB".to_string(), Some(35.0));
        let mut derived = a.clone();
        add_team_derived(&mut derived, &b);
        // opp DRB = 35 - 5 = 30
        assert!(close(get(&derived, "ORB%").unwrap(), 20.0 / 50.0));
        assert!(close(get(&derived, "DRB%").unwrap(), 30.0 / 35.0));
    }

    #[test]
    fn player_rate_stats_scale_by_floor_share() {
        let mut team = fixture_team_a();
        let opp = fixture_team_b();
        add_team_derived(&mut team, &opp);

        let mut pl = line(&[
            ("MP", 24.0),
            ("FG", 5.0),
            ("FGA", 10.0),
            ("3P", 1.0),
            ("3PA", 2.0),
            ("FT", 2.0),
            ("FTA", 2.0),
            ("ORB", 2.0),
            ("TRB", 6.0),
            ("AST", 4.0),
            ("STL", 1.0),
            ("BLK", 1.0),
            ("TOV", 2.0),
            ("PF", 3.0),
            ("PTS", 13.0),
        ]);
        add_player_derived(&mut pl, &team, &opp);

        // ORB% = 100 * 2 * 48 / (24 * (10 + 30)) = 10
        assert!(close(get(&pl, "ORB%").unwrap(), 10.0));
        // TOV% = 100 * 2 / (10 + 0.88 + 2)
        assert!(close(get(&pl, "TOV%").unwrap(), 200.0 / 12.88));
        // AST% = 100 * 4 / ((24/48) * 40 - 5) = 400 / 15
        assert!(close(get(&pl, "AST%").unwrap(), 400.0 / 15.0));
        // HOB uses the team's FG.
        assert!(close(get(&pl, "HOB").unwrap(), 9.0 / 40.0));
    }

    #[test]
    fn player_tov_percent_zero_denominator_is_null() {
        let mut team = fixture_team_a();
        let opp = fixture_team_b();
        add_team_derived(&mut team, &opp);
        let mut pl = line(&[
            ("MP", 5.0),
            ("FG", 0.0),
            ("FGA", 0.0),
            ("3P", 0.0),
            ("3PA", 0.0),
            ("FT", 0.0),
            ("FTA", 0.0),
            ("ORB", 0.0),
            ("TRB", 0.0),
            ("AST", 0.0),
            ("STL", 0.0),
            ("BLK", 0.0),
            ("TOV", 0.0),
            ("PF", 0.0),
            ("PTS", 0.0),
        ]);
        add_player_derived(&mut pl, &team, &opp);
        assert_eq!(get(&pl, "TOV%"), None);
    }

    #[test]
    fn plus_minus_is_signed_and_mirrored() {
        let mut home = fixture_team_b();
        let mut away = fixture_team_a();
        add_plus_minus(&mut home, &mut away);
        assert_eq!(get(&home, "+/-"), Some(10.0));
        assert_eq!(get(&away, "+/-"), Some(-10.0));
    }
}
