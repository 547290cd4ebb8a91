//! Rate coefficients for the hydrogen chemistry and the radiative cooling
//! processes included in the thermal update. All rates are in cgs units
//! (seconds), so callers multiply by the time unit of the problem. Every
//! function expects a strictly positive temperature; callers apply the
//! temperature floor before evaluating them.




/**
 * Case B radiative recombination rate coefficient of hydrogen (cm^3 / s).
 */
pub fn recombination_rate(t: f64) -> f64 {
    2.59e-13 * (t / 1.0e4).powf(-0.7)
}




/**
 * Collisional ionization rate coefficient of hydrogen by electron impact
 * (cm^3 / s).
 */
pub fn collisional_ionization_rate(t: f64) -> f64 {
    5.84e-11 * t.sqrt() * (-157821.5 / t).exp()
}




/**
 * Energy lost per unit time per unit n_e n_H+ through case B recombination
 * (erg cm^3 / s). `k_b` is Boltzmann's constant in the units of the problem.
 */
pub fn recombination_cooling_rate(t: f64, k_b: f64) -> f64 {
    6.1e-10 * k_b * t.powf(0.11)
}




/**
 * Volumetric cooling rate from collisionally excited Lyman alpha emission
 * (erg / cm^3 / s), following Krumholz, Stone & Gardiner (2007). The
 * returned value is a cooling rate and is never negative; it is subtracted
 * from the thermal energy rate.
 */
pub fn lyman_alpha_cooling_rate(n_h: f64, n_e: f64, t: f64) -> f64 {
    7.3e-19 * n_e * n_h * (-118400.0 / t).exp()
}




/**
 * Generic photoelectric heating rate per hydrogen atom (erg / s), from
 * Koyama & Inutsuka (2002).
 */
pub fn heating_rate() -> f64 {
    2.0e-26
}




/**
 * Generic atomic line cooling rate coefficient (erg cm^3 / s), the fit of
 * Koyama & Inutsuka (2002) to the cooling of neutral atomic gas.
 */
pub fn cooling_rate(t: f64) -> f64 {
    2.0e-26 * (1.0e7 * (-1.184e5 / (t + 1000.0)).exp() + 1.4e-2 * t.sqrt() * (-92.0 / t).exp())
}
